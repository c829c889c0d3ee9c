use drybox_common::{
    BringupState, LinkStatus, NetworkConfig, SharedReadingState, TimingConfig,
};
use tokio::time::sleep;
use tracing::{info, warn};

pub trait NetworkLink {
    fn activate(&mut self) -> anyhow::Result<()>;
    fn disable_power_save(&mut self) -> anyhow::Result<()>;
    fn begin_association(&mut self, ssid: &str, pass: &str) -> anyhow::Result<()>;
    fn status(&mut self) -> LinkStatus;
}

pub async fn bring_up<L: NetworkLink>(
    link: &mut L,
    network: &NetworkConfig,
    timing: &TimingConfig,
    state: &SharedReadingState,
) -> BringupState {
    let outcome = associate(link, network, timing).await;

    match outcome.address() {
        Some(ip) => {
            state.assign_address(ip);
            info!("network associated, address {ip}");
        }
        None => warn!(
            "network association failed after {} attempts; telemetry stays disabled",
            timing.bringup_attempts
        ),
    }
    outcome
}

async fn associate<L: NetworkLink>(
    link: &mut L,
    network: &NetworkConfig,
    timing: &TimingConfig,
) -> BringupState {
    if let Err(err) = link.activate() {
        warn!("failed to activate network interface: {err:#}");
        return BringupState::Failed;
    }

    if let Err(err) = link.disable_power_save() {
        warn!("failed to disable power save: {err:#}");
    }

    if let Err(err) = link.begin_association(&network.wifi_ssid, &network.wifi_pass) {
        warn!("failed to start association: {err:#}");
        return BringupState::Failed;
    }

    info!("associating with `{}`", network.wifi_ssid);

    let budget = timing.bringup_attempts;
    let mut state = BringupState::Idle.begin();
    loop {
        state = state.observe(link.status(), budget);
        match state {
            BringupState::Associating { polls } => {
                info!("waiting for association ({polls}/{budget})");
                sleep(timing.bringup_poll_interval()).await;
            }
            _ => return state,
        }
    }
}
