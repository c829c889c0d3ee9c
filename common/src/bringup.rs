use std::net::Ipv4Addr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    Down,
    Connecting,
    Associated(Ipv4Addr),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BringupState {
    #[default]
    Idle,
    Associating {
        polls: u32,
    },
    Associated(Ipv4Addr),
    Failed,
}

impl BringupState {
    pub fn begin(self) -> Self {
        match self {
            Self::Idle => Self::Associating { polls: 0 },
            other => other,
        }
    }

    // Folds one status poll into the state. `budget` counts the waits
    // between polls; the status is checked once more after the last wait,
    // so failure comes on poll `budget + 1`.
    pub fn observe(self, status: LinkStatus, budget: u32) -> Self {
        match self {
            Self::Associating { polls } => {
                let polls = polls.saturating_add(1);
                match status {
                    LinkStatus::Associated(ip) => Self::Associated(ip),
                    _ if polls > budget => Self::Failed,
                    _ => Self::Associating { polls },
                }
            }
            other => other,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Associated(_) | Self::Failed)
    }

    pub fn address(self) -> Option<Ipv4Addr> {
        match self {
            Self::Associated(ip) => Some(ip),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::Associating { .. } => "ASSOCIATING",
            Self::Associated(_) => "ASSOCIATED",
            Self::Failed => "FAILED",
        }
    }
}
