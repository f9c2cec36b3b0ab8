use crate::{
    query,
    types::{DisplayMode, NodeState},
};

/// The control page. Polls `/data` once a second from the browser and
/// drives everything else through query-string requests, so the node only
/// ever has to parse one request shape.
const CONTROL_PAGE: &str = r#"<!doctype html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <title>Room Sensor Node</title>
  <style>
    body{font-family:Arial,sans-serif;max-width:560px;margin:2rem auto;padding:0 1rem;color:#111;text-align:center}
    h1{margin:0 0 1rem}
    .card{border:1px solid #ddd;border-radius:10px;padding:1rem;margin-bottom:1rem}
    .value{font-weight:bold;color:#106010}
    p{margin:.35rem 0}
    button{padding:8px 12px;margin:6px}
    input[type=text]{width:200px;padding:.5rem;box-sizing:border-box}
  </style>
  <script>
    async function fetchData(){
      let r = await fetch('/data');
      let j = await r.json();
      document.getElementById('gpio').innerHTML = j.gpio;
      document.getElementById('temp').innerHTML = j.temperature + ' &deg;C';
      document.getElementById('hum').innerHTML = j.humidity + ' %';
      document.getElementById('dist').innerHTML = j.distance + ' cm';
    }
    setInterval(fetchData, 1000);
  </script>
</head>
<body onload="fetchData()">
  <h1>Room Sensor Node</h1>

  <div class="card">
    <p>LED state: <span id="gpio" class="value">--</span></p>
    <p>Temperature: <span id="temp" class="value">--</span></p>
    <p>Humidity: <span id="hum" class="value">--</span></p>
    <p>Distance: <span id="dist" class="value">--</span></p>
  </div>

  <div class="card">
    <p>
      <a href="/?led=on"><button>LED ON</button></a>
      <a href="/?led=off"><button>LED OFF</button></a>
    </p>
    <p>
      <a href="/?lcd=dist"><button>Show Distance</button></a>
      <a href="/?lcd=temp"><button>Show Temp</button></a>
    </p>
    <form action="/" method="get">
      <input type="text" name="lcdtext" placeholder="Text for the display">
      <button type="submit">Send</button>
    </form>
  </div>
</body>
</html>
"#;

/// A finished response. Status is always `200 OK` and the connection is
/// closed after one exchange, so only the content type and body vary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    content_type: &'static str,
    body: String,
}

impl HttpResponse {
    pub fn json(body: String) -> Self {
        Self {
            content_type: "application/json",
            body,
        }
    }

    pub fn html(body: &str) -> Self {
        Self {
            content_type: "text/html",
            body: body.to_string(),
        }
    }

    pub fn content_type(&self) -> &'static str {
        self.content_type
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn into_bytes(self) -> Vec<u8> {
        let mut out = String::with_capacity(self.body.len() + 96);
        out.push_str("HTTP/1.1 200 OK\r\n");
        out.push_str("Content-Type: ");
        out.push_str(self.content_type);
        out.push_str("\r\nConnection: close\r\n\r\n");
        out.push_str(&self.body);
        out.into_bytes()
    }
}

/// Services one raw request against the shared state: applies recognized
/// query parameters as side effects, then routes to telemetry or the
/// control page. Never fails; anything unparseable degrades to the page.
pub fn handle(raw: &[u8], state: &mut NodeState) -> HttpResponse {
    let request = String::from_utf8_lossy(raw);
    let path = query::request_path(&request);
    let params = query::query_params(path);

    if let Some(value) = params.get("led") {
        match value.as_str() {
            "on" => state.output_on = true,
            "off" => state.output_on = false,
            _ => {}
        }
    }

    if let Some(value) = params.get("lcd") {
        match value.as_str() {
            "dist" => state.display.set_mode(DisplayMode::Distance),
            "temp" => state.display.set_mode(DisplayMode::Temperature),
            _ => {}
        }
    }

    // Applied after `lcd`, so free text wins when both arrive together.
    if let Some(value) = params.get("lcdtext") {
        state.display.set_mode(DisplayMode::Text(value.clone()));
    }

    let route = path.split('?').next().unwrap_or("/");
    if route == "/data" {
        let body =
            serde_json::to_string(&state.telemetry()).unwrap_or_else(|_| String::from("{}"));
        HttpResponse::json(body)
    } else {
        HttpResponse::html(CONTROL_PAGE)
    }
}
