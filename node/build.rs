fn main() -> anyhow::Result<()> {
    println!("cargo:rerun-if-env-changed=WIFI_SSID");
    println!("cargo:rerun-if-env-changed=WIFI_PASS");
    println!("cargo:rerun-if-env-changed=MQTT_HOST");
    println!("cargo:rerun-if-env-changed=MQTT_PORT");
    println!("cargo:rerun-if-env-changed=MQTT_USER");
    println!("cargo:rerun-if-env-changed=MQTT_PASS");

    // host builds have no ESP-IDF toolchain to propagate
    if std::env::var_os("CARGO_FEATURE_ESP32").is_none() {
        return Ok(());
    }

    embuild::build::CfgArgs::output_propagated("ESP_IDF")?;
    embuild::build::LinkArgs::output_propagated("ESP_IDF")?;
    Ok(())
}
