//! Presentation surfaces for interactive sign-in flows.
//!
//! Interactive providers need somewhere on screen to attach their UI. The
//! host application describes its windows through [`WindowState`]; the
//! [`PresentationResolver`] picks the best anchor from that description.
//!
//! Resolution order, first match wins:
//! 1. The key surface of the first foreground-active scene.
//! 2. Any key surface, whatever the activation state of its scene.
//! 3. [`PresentationAnchor::Detached`], a context-free default.
//!
//! Interactive auth can start before window activation has settled (e.g. at
//! cold start), so resolution never fails; it degrades to step 3.

use std::fmt;
use std::sync::Arc;

/// Opaque handle to a surface's root content controller.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RootController(String);

impl RootController {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RootController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A top-level on-screen surface (a window).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Surface {
    id: String,
    is_key: bool,
    root_controller: Option<RootController>,
}

impl Surface {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            is_key: false,
            root_controller: None,
        }
    }

    /// Mark this surface as the key (input-receiving) surface.
    pub fn with_key(mut self, is_key: bool) -> Self {
        self.is_key = is_key;
        self
    }

    pub fn with_root_controller(mut self, controller: RootController) -> Self {
        self.root_controller = Some(controller);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_key(&self) -> bool {
        self.is_key
    }

    pub fn root_controller(&self) -> Option<&RootController> {
        self.root_controller.as_ref()
    }
}

/// Activation state of a scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationState {
    ForegroundActive,
    ForegroundInactive,
    Background,
    Unattached,
}

/// A group of surfaces sharing one activation state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scene {
    pub activation_state: ActivationState,
    pub surfaces: Vec<Surface>,
}

impl Scene {
    pub fn new(activation_state: ActivationState, surfaces: Vec<Surface>) -> Self {
        Self {
            activation_state,
            surfaces,
        }
    }

    fn key_surface(&self) -> Option<&Surface> {
        self.surfaces.iter().find(|s| s.is_key())
    }
}

/// Source of the process's current window state.
///
/// Implemented by the host UI layer; this crate never creates windows.
pub trait WindowState: Send + Sync {
    /// Currently connected scenes, in platform order.
    fn scenes(&self) -> Vec<Scene>;
}

/// Fixed window state, for hosts with a single static surface and for tests.
#[derive(Debug, Clone, Default)]
pub struct StaticWindowState {
    scenes: Vec<Scene>,
}

impl StaticWindowState {
    pub fn new(scenes: Vec<Scene>) -> Self {
        Self { scenes }
    }

    /// No scenes at all, as during a cold start.
    pub fn empty() -> Self {
        Self::default()
    }
}

impl WindowState for StaticWindowState {
    fn scenes(&self) -> Vec<Scene> {
        self.scenes.clone()
    }
}

/// Where an interactive flow should anchor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresentationAnchor {
    /// A concrete on-screen surface.
    Surface(Surface),
    /// Context-free default when no surface exists yet.
    Detached,
}

impl PresentationAnchor {
    /// Convert into a presentation context; `Detached` has none.
    pub fn into_context(self) -> Option<PresentationContext> {
        match self {
            PresentationAnchor::Surface(surface) => Some(PresentationContext::new(surface)),
            PresentationAnchor::Detached => None,
        }
    }
}

/// Caller-owned handle to the surface an interactive flow attaches to.
///
/// Adapters borrow it for the duration of one sign-in attempt and never keep it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresentationContext {
    surface: Surface,
}

impl PresentationContext {
    pub fn new(surface: Surface) -> Self {
        Self { surface }
    }

    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    pub fn root_controller(&self) -> Option<&RootController> {
        self.surface.root_controller()
    }
}

/// Delegate contract a provider flow calls back into for its anchor.
pub trait PresentationAnchorProvider: Send + Sync {
    fn presentation_anchor(&self) -> PresentationAnchor;
}

/// Picks the on-screen anchor for interactive flows.
#[derive(Clone)]
pub struct PresentationResolver {
    windows: Arc<dyn WindowState>,
}

impl PresentationResolver {
    pub fn new(windows: Arc<dyn WindowState>) -> Self {
        Self { windows }
    }

    /// Resolve the best anchor for the current window state.
    pub fn resolve(&self) -> PresentationAnchor {
        let scenes = self.windows.scenes();

        let foreground_key = scenes
            .iter()
            .find(|scene| scene.activation_state == ActivationState::ForegroundActive)
            .and_then(Scene::key_surface);
        if let Some(surface) = foreground_key {
            tracing::debug!(surface = surface.id(), "anchoring to foreground key surface");
            return PresentationAnchor::Surface(surface.clone());
        }

        if let Some(surface) = scenes.iter().find_map(Scene::key_surface) {
            tracing::debug!(surface = surface.id(), "anchoring to key surface of inactive scene");
            return PresentationAnchor::Surface(surface.clone());
        }

        tracing::debug!("no key surface available, using detached anchor");
        PresentationAnchor::Detached
    }
}

impl PresentationAnchorProvider for PresentationResolver {
    fn presentation_anchor(&self) -> PresentationAnchor {
        self.resolve()
    }
}

impl fmt::Debug for PresentationResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PresentationResolver").finish_non_exhaustive()
    }
}
