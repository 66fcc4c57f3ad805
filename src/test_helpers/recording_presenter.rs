//! Presenter that records every call for assertions.

use parking_lot::Mutex;

use crate::orchestration::{AlertLevel, Presenter, Progress, Route};

#[derive(Debug, Clone, PartialEq)]
pub enum PresenterEvent {
    ShowProgress { title: String, progress: Progress },
    HideProgress,
    Message(String),
    Alert { text: String, level: AlertLevel },
    Navigate(Route),
}

#[derive(Debug, Default)]
pub struct RecordingPresenter {
    events: Mutex<Vec<PresenterEvent>>,
}

impl RecordingPresenter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<PresenterEvent> {
        self.events.lock().clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                PresenterEvent::Message(text) => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn alerts(&self) -> Vec<(String, AlertLevel)> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                PresenterEvent::Alert { text, level } => Some((text.clone(), *level)),
                _ => None,
            })
            .collect()
    }

    pub fn routes(&self) -> Vec<Route> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                PresenterEvent::Navigate(route) => Some(route.clone()),
                _ => None,
            })
            .collect()
    }

    /// Determinate progress updates in the order they were shown
    pub fn progress_updates(&self) -> Vec<(usize, usize)> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                PresenterEvent::ShowProgress {
                    progress: Progress::Determinate { completed, total },
                    ..
                } => Some((*completed, *total)),
                _ => None,
            })
            .collect()
    }

    /// How many times `text` was shown as a message or alert
    pub fn count_message(&self, text: &str) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|event| match event {
                PresenterEvent::Message(message) => message == text,
                PresenterEvent::Alert { text: message, .. } => message == text,
                _ => false,
            })
            .count()
    }

    /// Position of the first event matching `predicate`
    pub fn position(&self, predicate: impl Fn(&PresenterEvent) -> bool) -> Option<usize> {
        self.events.lock().iter().position(predicate)
    }

    fn record(&self, event: PresenterEvent) {
        self.events.lock().push(event);
    }
}

impl Presenter for RecordingPresenter {
    fn show_progress(&self, title: &str, progress: Progress) {
        self.record(PresenterEvent::ShowProgress {
            title: title.to_string(),
            progress,
        });
    }

    fn hide_progress(&self) {
        self.record(PresenterEvent::HideProgress);
    }

    fn message(&self, text: &str) {
        self.record(PresenterEvent::Message(text.to_string()));
    }

    fn alert(&self, text: &str, level: AlertLevel) {
        self.record(PresenterEvent::Alert {
            text: text.to_string(),
            level,
        });
    }

    fn navigate(&self, route: &Route) {
        self.record(PresenterEvent::Navigate(route.clone()));
    }
}
