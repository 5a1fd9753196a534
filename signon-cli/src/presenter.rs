//! Terminal stand-ins for the host UI.

use signon_core::oauth::UrlPresenter;
use signon_core::presentation::ActivationState;
use signon_core::{ProviderError, RootController, Scene, StaticWindowState, Surface};
use url::Url;

/// The terminal is the only surface; it is always key and in the foreground.
pub fn terminal_windows() -> StaticWindowState {
    StaticWindowState::new(vec![Scene::new(
        ActivationState::ForegroundActive,
        vec![
            Surface::new("terminal")
                .with_key(true)
                .with_root_controller(RootController::new("terminal")),
        ],
    )])
}

/// Prints the authorization URL for the user to open.
#[derive(Debug, Default)]
pub struct TerminalPresenter;

impl UrlPresenter for TerminalPresenter {
    fn present(&self, url: &Url, _presenting: &RootController) -> Result<(), ProviderError> {
        eprintln!("Open this URL in your browser to continue:");
        eprintln!();
        eprintln!("  {}", url);
        eprintln!();
        Ok(())
    }
}
