use std::sync::Arc;

use crate::services::{
    booking::HttpBookingClient,
    location::{LocationSource, Locator},
    workflow::CompletionWorkflow,
    worklist::{JobBoard, Worklist},
};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub booking: Arc<HttpBookingClient>,
    pub locator: Arc<Locator<LocationSource>>,
    pub worklist: Arc<Worklist<HttpBookingClient>>,
    pub completion: Arc<CompletionWorkflow<HttpBookingClient>>,
}

impl AppState {
    pub fn new(booking: HttpBookingClient, locator: Locator<LocationSource>) -> Self {
        let booking = Arc::new(booking);
        let board = Arc::new(JobBoard::new());
        Self {
            worklist: Arc::new(Worklist::new(booking.clone(), board.clone())),
            completion: Arc::new(CompletionWorkflow::new(booking.clone(), board)),
            locator: Arc::new(locator),
            booking,
        }
    }
}
