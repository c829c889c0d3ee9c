use crate::types::Snapshot;

pub const RESPONSE_HEAD: &str = "HTTP/1.0 200 OK\r\nContent-type: text/html\r\n\r\n";

pub const REFRESH_SECS: u64 = 3;

pub fn render_page(snapshot: &Snapshot) -> String {
    let reading = snapshot.reading;
    format!(
        r#"<!DOCTYPE html>
<html lang="cs">
<head>
  <meta charset="UTF-8">
  <meta name="viewport" content="width=device-width, initial-scale=1.0">
  <meta http-equiv="refresh" content="{refresh}">
  <title>DryBox</title>
  <style>
    body{{background:#121212;color:#e0e0e0;font-family:sans-serif;padding:20px;text-align:center}}
    h1{{font-weight:300;margin-bottom:20px}}
    .card{{background:#1e1e1e;border-radius:12px;padding:15px;margin-bottom:10px;display:flex;justify-content:space-between;align-items:center;border:1px solid #333}}
    .val{{font-size:1.8rem;font-weight:bold}}
    .temp{{color:#ff6b6b}} .hum{{color:#4ecdc4}} .dew{{color:#ffe66d}}
  </style>
</head>
<body>
  <h1>DryBox Monitor</h1>
  <div class="card"><span>Teplota</span><span class="val temp">{temperature:.1}°C</span></div>
  <div class="card"><span>Vlhkost</span><span class="val hum">{humidity:.1}%</span></div>
  <div class="card"><span>Rosný bod</span><span class="val dew">{dew_point:.1}°C</span></div>
  <p style="color:#666;margin-top:30px">IP: {address}</p>
</body>
</html>
"#,
        refresh = REFRESH_SECS,
        temperature = reading.temperature_c,
        humidity = reading.humidity_pct,
        dew_point = reading.dew_point_c,
        address = snapshot.address,
    )
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use super::*;
    use crate::types::{NetworkAddress, Reading};

    #[test]
    fn page_embeds_one_decimal_values_and_address() {
        let page = render_page(&Snapshot {
            reading: Reading {
                temperature_c: 21.46,
                humidity_pct: 38.04,
                dew_point_c: 6.55,
            },
            address: NetworkAddress::Assigned(Ipv4Addr::new(192, 168, 1, 5)),
        });

        assert!(page.contains("21.5°C"));
        assert!(page.contains("38.0%"));
        assert!(page.contains("6.5°C") || page.contains("6.6°C"));
        assert!(page.contains("IP: 192.168.1.5"));
        assert!(page.contains(r#"<meta http-equiv="refresh" content="3">"#));
    }

    #[test]
    fn unassigned_address_shows_sentinel() {
        let page = render_page(&Snapshot::default());
        assert!(page.contains("IP: 0.0.0.0"));
        assert!(page.contains("0.0°C"));
    }

    #[test]
    fn response_head_is_minimal_http10() {
        assert!(RESPONSE_HEAD.starts_with("HTTP/1.0 200 OK\r\n"));
        assert!(RESPONSE_HEAD.ends_with("\r\n\r\n"));
    }
}
