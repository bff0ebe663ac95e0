use ratatui::Frame;

use crate::{
    session::Finish,
    ui::{render_playing, render_results},
    App, AppState,
};

/// A UI Screen boundary: renders one state of the app
pub trait Screen {
    fn render(&self, app: &App, f: &mut Frame);
}

/// Play field with the player's hands
pub struct PlayScreen;

impl Screen for PlayScreen {
    fn render(&self, app: &App, f: &mut Frame) {
        let area = f.area();
        render_playing(app, area, f.buffer_mut());
    }
}

/// Elapsed time and verdict for a finished round
pub struct ResultsScreen(pub Finish);

impl Screen for ResultsScreen {
    fn render(&self, _app: &App, f: &mut Frame) {
        let area = f.area();
        render_results(self.0, area, f.buffer_mut());
    }
}

/// Helper to construct the appropriate screen for the current state
pub fn current_screen(state: &AppState) -> Box<dyn Screen> {
    match state {
        AppState::Playing => Box::new(PlayScreen),
        AppState::Results(finish) => Box::new(ResultsScreen(*finish)),
    }
}

/// Draws whatever screen `app` is on.
pub fn draw(app: &App, f: &mut Frame) {
    current_screen(&app.state).render(app, f);
}
