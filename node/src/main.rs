mod app;
mod bringup;
mod faults;
mod sampling;
mod telemetry;
mod web;

#[cfg(feature = "esp32")]
mod esp;
#[cfg(not(feature = "esp32"))]
mod host;
#[cfg(not(feature = "esp32"))]
mod mqtt;
#[cfg(any(test, not(feature = "esp32")))]
mod sim;
#[cfg(test)]
mod testing;

#[cfg(not(feature = "esp32"))]
#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    host::run().await
}

#[cfg(feature = "esp32")]
fn main() -> anyhow::Result<()> {
    esp::run()
}
