//! Inbound commands from UI collaborators.
//!
//! The UI holds a cloneable [`Commands`] handle; the engine owns the
//! receiving [`CommandQueue`]. Sends never block and are dropped quietly once
//! the engine has torn down.

use safestreets_shared::{DrawRoutesDetail, FitRoutePointsDetail, LngLatDetail};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "detail", rename_all = "kebab-case")]
pub enum Command {
    ToggleHeat,
    ToggleTheme { enabled: bool },
    DrawRoutes(DrawRoutesDetail),
    SetDestination(LngLatDetail),
    FitRoutePoints(FitRoutePointsDetail),
    ZoomIn,
    ZoomOut,
    Geolocate(Option<LngLatDetail>),
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::ToggleHeat => "toggle-heat",
            Command::ToggleTheme { .. } => "toggle-theme",
            Command::DrawRoutes(_) => "draw-routes",
            Command::SetDestination(_) => "set-destination",
            Command::FitRoutePoints(_) => "fit-route-points",
            Command::ZoomIn => "zoom-in",
            Command::ZoomOut => "zoom-out",
            Command::Geolocate(_) => "geolocate",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Commands {
    tx: mpsc::UnboundedSender<Command>,
}

impl Commands {
    pub fn send(&self, command: Command) {
        let name = command.name();
        if self.tx.send(command).is_err() {
            debug!(command = name, "engine gone, dropping command");
        }
    }

    pub fn toggle_heat(&self) {
        self.send(Command::ToggleHeat);
    }

    pub fn toggle_theme(&self, enabled: bool) {
        self.send(Command::ToggleTheme { enabled });
    }

    pub fn draw_routes(&self, detail: DrawRoutesDetail) {
        self.send(Command::DrawRoutes(detail));
    }

    pub fn set_destination(&self, lng: f64, lat: f64) {
        self.send(Command::SetDestination(LngLatDetail { lng, lat }));
    }

    pub fn fit_route_points(&self, origin: LngLatDetail, destination: LngLatDetail) {
        self.send(Command::FitRoutePoints(FitRoutePointsDetail {
            origin,
            destination,
        }));
    }

    pub fn zoom_in(&self) {
        self.send(Command::ZoomIn);
    }

    pub fn zoom_out(&self) {
        self.send(Command::ZoomOut);
    }

    pub fn geolocate(&self, center: Option<LngLatDetail>) {
        self.send(Command::Geolocate(center));
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[derive(Debug)]
pub struct CommandQueue {
    rx: mpsc::UnboundedReceiver<Command>,
}

impl CommandQueue {
    pub fn try_next(&mut self) -> Option<Command> {
        self.rx.try_recv().ok()
    }

    /// Waits for the next command. `None` once every handle is dropped or
    /// the queue was closed.
    pub async fn next(&mut self) -> Option<Command> {
        self.rx.recv().await
    }

    /// Stop accepting commands and discard anything still queued.
    pub fn close(&mut self) -> usize {
        self.rx.close();
        let mut dropped = 0;
        while self.rx.try_recv().is_ok() {
            dropped += 1;
        }
        dropped
    }
}

pub fn channel() -> (Commands, CommandQueue) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Commands { tx }, CommandQueue { rx })
}
