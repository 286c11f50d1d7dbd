use crate::{config::AxisRange, frequency::FrequencyTable};
use anyhow::{anyhow, Context, Result};
use governor::{Jitter, Quota};
use json::{object, JsonValue};
use log::{debug, error, info};
use reqwest::{Response, StatusCode};
use std::{
    env,
    num::NonZeroU32,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};
use thiserror::Error;

pub const DEFAULT_BASE_URL: &str = "https://quickchart.io";

const USED_COLOR: &str = "rgb(97,170,242)";
const UNUSED_COLOR: &str = "rgb(242,194,145)";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartKind {
    Bar,
    HorizontalBar,
    Pie,
}

impl ChartKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ChartKind::Bar => "bar",
            ChartKind::HorizontalBar => "horizontalBar",
            ChartKind::Pie => "pie",
        }
    }
}

/// JavaScript functions referenced from a chart configuration. JSON cannot hold
/// them, so the configuration carries a placeholder string that is swapped for
/// the source when the configuration is serialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Script {
    PercentTick,
    PieShare,
    StackedPercent,
}

impl Script {
    const ALL: [Script; 3] = [Script::PercentTick, Script::PieShare, Script::StackedPercent];

    fn placeholder(self) -> &'static str {
        match self {
            Script::PercentTick => "@@script:percent_tick@@",
            Script::PieShare => "@@script:pie_share@@",
            Script::StackedPercent => "@@script:stacked_percent@@",
        }
    }

    fn source(self) -> &'static str {
        match self {
            Script::PercentTick => "function (value) { return value.toFixed(0) + '%'; }",
            Script::PieShare => {
                "function (value, context) { \
                 var total = context.dataset.data.reduce(function (a, b) { return a + b; }, 0); \
                 return (value / total * 100).toFixed(1) + '%'; }"
            }
            Script::StackedPercent => {
                "function (value) { \
                 return value > 0 ? (value < 100 ? value.toFixed(1) + '%' : value + '%') : ''; }"
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub label: Option<String>,
    pub data: Vec<f64>,
    /// One color for the whole dataset, or one per data point
    pub colors: Vec<String>,
}

impl Dataset {
    fn to_json(&self) -> JsonValue {
        let mut dataset = object! {
            data: (JsonValue::Array(self.data.iter().map(|&v| v.into()).collect())),
        };
        if let Some(label) = &self.label {
            dataset["label"] = label.as_str().into();
        }
        dataset["backgroundColor"] = match self.colors.as_slice() {
            [single] => single.as_str().into(),
            colors => JsonValue::Array(colors.iter().map(|c| c.as_str().into()).collect()),
        };
        dataset
    }
}

/// A Chart.js (v2) chart and the size of the image to rasterize it to.
#[derive(Debug, Clone)]
pub struct Chart {
    pub kind: ChartKind,
    pub labels: Vec<String>,
    pub datasets: Vec<Dataset>,
    pub options: JsonValue,
    pub width: u32,
    pub height: u32,
}

impl Chart {
    /// One bar per operator, colored by operator name.
    pub fn frequency(table: &FrequencyTable, kind: ChartKind) -> Self {
        let value_axis = object! { ticks: { fontFamily: "Verdana", fontStyle: "bold", beginAtZero: true } };
        let label_axis = object! { ticks: { fontFamily: "Verdana", fontStyle: "bold" } };
        let (x_axis, y_axis) = match kind {
            ChartKind::HorizontalBar => (value_axis, label_axis),
            _ => (label_axis, value_axis),
        };
        let options = object! {
            legend: { display: false },
            title: { display: false },
            scales: {
                xAxes: (JsonValue::Array(vec![x_axis])),
                yAxes: (JsonValue::Array(vec![y_axis])),
            },
        };
        Self {
            kind,
            labels: table.keys().map(str::to_owned).collect(),
            datasets: vec![Dataset {
                label: None,
                data: table.iter().map(|(_, count)| count as f64).collect(),
                colors: table.keys().map(color_for).collect(),
            }],
            options,
            width: 500,
            height: 300,
        }
    }

    /// Grouped bars of percentages, one group per label and one dataset per series.
    pub fn percentage_groups(labels: Vec<String>, datasets: Vec<Dataset>, axis: AxisRange, width: u32) -> Self {
        let options = object! {
            barValueSpacing: 10,
            legend: { display: true, position: "bottom", fontFamily: "sans-serif", fontColor: "black" },
            title: { display: false },
            scales: {
                xAxes: [{ ticks: { fontFamily: "sans-serif", fontStyle: "bold", fontColor: "black", beginAtZero: true } }],
                yAxes: [{
                    ticks: {
                        fontFamily: "sans-serif",
                        fontStyle: "bold",
                        fontColor: "black",
                        beginAtZero: true,
                        max: (axis.max),
                        stepSize: (axis.step),
                        callback: (Script::PercentTick.placeholder()),
                    }
                }],
            },
        };
        Self {
            kind: ChartKind::Bar,
            labels,
            datasets,
            options,
            width,
            height: 300,
        }
    }

    /// Pie of used against unused operators, labelled with their share.
    pub fn utilization_pie(used: usize, unused: usize) -> Self {
        let options = object! {
            legend: { display: true, position: "bottom", labels: { fontFamily: "Verdana" } },
            title: { display: false },
            tooltips: { enabled: false },
            plugins: {
                datalabels: {
                    color: "black",
                    font: { weight: "bold", family: "Verdana" },
                    formatter: (Script::PieShare.placeholder()),
                }
            },
        };
        Self {
            kind: ChartKind::Pie,
            labels: vec![String::from("Being used"), String::from("Not being used")],
            datasets: vec![Dataset {
                label: None,
                data: vec![used as f64, unused as f64],
                colors: vec![USED_COLOR.to_owned(), UNUSED_COLOR.to_owned()],
            }],
            options,
            width: 500,
            height: 300,
        }
    }

    /// One stacked 100% bar per library, split into used and unused operators.
    pub fn utilization_stacked(libraries: Vec<String>, used_percent: Vec<f64>, unused_percent: Vec<f64>) -> Self {
        let options = object! {
            legend: { display: true, position: "bottom", labels: { fontColor: "black", fontFamily: "sans-serif" } },
            title: { display: false },
            plugins: {
                datalabels: {
                    color: "black",
                    font: { weight: "bold", family: "sans-serif" },
                    formatter: (Script::StackedPercent.placeholder()),
                }
            },
            scales: {
                xAxes: [{
                    stacked: true,
                    ticks: { fontColor: "black", fontFamily: "sans-serif", fontStyle: "bold" },
                    maxBarThickness: 80,
                }],
                yAxes: [{
                    stacked: true,
                    ticks: {
                        fontColor: "black",
                        fontFamily: "sans-serif",
                        fontStyle: "bold",
                        min: 0,
                        max: 100,
                        stepSize: 50,
                        callback: (Script::PercentTick.placeholder()),
                    }
                }],
            },
        };
        let bars = libraries.len();
        Self {
            kind: ChartKind::Bar,
            labels: libraries,
            datasets: vec![
                Dataset {
                    label: Some(String::from("Being used")),
                    data: used_percent,
                    colors: vec![USED_COLOR.to_owned(); bars],
                },
                Dataset {
                    label: Some(String::from("Not being used")),
                    data: unused_percent,
                    colors: vec![UNUSED_COLOR.to_owned(); bars],
                },
            ],
            options,
            width: 400,
            height: 200,
        }
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn to_json(&self) -> JsonValue {
        object! {
            "type": (self.kind.as_str()),
            data: {
                labels: (JsonValue::Array(self.labels.iter().map(|l| l.as_str().into()).collect())),
                datasets: (JsonValue::Array(self.datasets.iter().map(Dataset::to_json).collect())),
            },
            options: (self.options.clone()),
        }
    }

    /// The configuration as the JavaScript object literal the renderer evaluates.
    pub fn to_script(&self) -> String {
        let mut script = self.to_json().dump();
        for function in Script::ALL {
            script = script.replace(&format!("\"{}\"", function.placeholder()), function.source());
        }
        script
    }

    fn request_body(&self) -> JsonValue {
        object! {
            version: "2",
            backgroundColor: "transparent",
            width: (self.width),
            height: (self.height),
            devicePixelRatio: 1.0,
            format: "png",
            chart: (self.to_script()),
        }
    }
}

/// A chart and the file its image goes to.
#[derive(Debug, Clone)]
pub struct RenderJob {
    pub path: PathBuf,
    pub chart: Chart,
}

impl RenderJob {
    pub fn new(path: impl Into<PathBuf>, chart: Chart) -> Self {
        Self {
            path: path.into(),
            chart,
        }
    }
}

/// Deterministic color for a label, as `#rrggbb`. The label's murmur3 hash
/// picks a hue; saturation stays within 50-55% and lightness within 50-60%.
pub fn color_for(label: &str) -> String {
    let (h1, h2) = mur3::murmurhash3_x64_128(label.as_bytes(), 0);
    let hue = (h1 % 360) as f64;
    let saturation = 50 + h2 % 6;
    let lightness = 50 + (h2 >> 8) % 11;
    hsl_to_hex(hue, saturation as f64 / 100.0, lightness as f64 / 100.0)
}

fn hsl_to_hex(hue: f64, saturation: f64, lightness: f64) -> String {
    let chroma = (1.0 - (2.0 * lightness - 1.0).abs()) * saturation;
    let sector = hue / 60.0;
    let x = chroma * (1.0 - (sector % 2.0 - 1.0).abs());
    let (r, g, b) = match sector as u32 {
        0 => (chroma, x, 0.0),
        1 => (x, chroma, 0.0),
        2 => (0.0, chroma, x),
        3 => (0.0, x, chroma),
        4 => (x, 0.0, chroma),
        _ => (chroma, 0.0, x),
    };
    let m = lightness - chroma / 2.0;
    let channel = |v: f64| ((v + m) * 255.0).round().clamp(0.0, 255.0) as u8;
    format!("#{:02x}{:02x}{:02x}", channel(r), channel(g), channel(b))
}

/// Client for a QuickChart compatible rendering service. Uses `Arc` internally to be cheaply cloneable.
#[derive(Clone)]
pub struct Client {
    client: reqwest::Client,
    data: Arc<ClientData>,
}

struct ClientData {
    base_url: reqwest::Url,
    rate_limiter: RateLimiter,
}

type RateLimiter = governor::RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::QuantaClock,
    governor::middleware::NoOpMiddleware<governor::clock::QuantaInstant>,
>;

impl Client {
    /// Construct a client for the service at `base_url`, sending at most `per_second` requests per second.
    pub fn new(base_url: &str, per_second: u32) -> Result<Self> {
        let mut base_url = base_url.to_owned();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        let per_second = NonZeroU32::new(per_second).ok_or_else(|| anyhow!("request rate must be positive"))?;
        Ok(Self {
            client: reqwest::Client::new(),
            data: Arc::new(ClientData {
                base_url: base_url.parse().with_context(|| format!("invalid chart service url {}", base_url))?,
                rate_limiter: RateLimiter::direct(Quota::per_second(per_second)),
            }),
        })
    }

    /// Construct a client from `QUICKCHART_URL` and `QUICKCHART_RATE`, falling back to the public
    /// service at two requests per second.
    pub fn from_env() -> Result<Self> {
        let base_url = env::var("QUICKCHART_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_owned());
        let per_second = match env::var("QUICKCHART_RATE") {
            Ok(rate) => rate.parse().with_context(|| format!("invalid QUICKCHART_RATE {}", rate))?,
            Err(_) => 2,
        };
        Self::new(&base_url, per_second)
    }

    async fn until_ready(&self) {
        let jitter = Jitter::up_to(Duration::from_millis(75));
        self.data.rate_limiter.until_ready_with_jitter(jitter).await;
    }

    /// POST the chart to the `/chart` endpoint and return the PNG bytes.
    pub async fn render(&self, chart: &Chart) -> Result<Vec<u8>> {
        self.until_ready().await;
        let url = self.data.base_url.join("chart")?;
        debug!("POST {}", url);
        let image = check_error(
            self.client
                .post(url)
                .body(chart.request_body().dump())
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .send()
                .await?,
        )
        .await?
        .bytes()
        .await?;
        Ok(image.to_vec())
    }

    pub async fn render_to_file(&self, job: &RenderJob) -> Result<()> {
        let image = self.render(&job.chart).await?;
        write_image(&job.path, &image).await?;
        info!("wrote {}", job.path.display());
        Ok(())
    }

    /// Render every job, logging failures as they happen. Fails afterwards if any job failed.
    pub async fn render_all(&self, jobs: &[RenderJob]) -> Result<()> {
        let mut errors = 0;
        for job in jobs {
            if let Err(error) = self.render_to_file(job).await {
                errors += 1;
                error!("chart {}: {:#}", job.path.display(), error);
            }
        }
        if errors > 0 {
            Err(anyhow!("{} of {} charts failed to render", errors, jobs.len()))
        } else {
            Ok(())
        }
    }
}

async fn write_image(path: &Path, image: &[u8]) -> Result<()> {
    tokio::fs::write(path, image)
        .await
        .with_context(|| format!("failed to write {}", path.display()))
}

#[derive(Debug, Error)]
#[error("chart service error:\n Status: {status_code}\n Error Message: {message}")]
pub struct ChartError {
    pub status_code: StatusCode,
    pub message: String,
}

async fn check_error(response: Response) -> Result<Response> {
    let status_code = response.status();
    if status_code.is_client_error() || status_code.is_server_error() {
        let header = response
            .headers()
            .get("x-quickchart-error")
            .and_then(|h| h.to_str().ok())
            .map(str::to_owned);
        let message = match header {
            Some(message) => message,
            None => response.text().await?,
        };
        Err(anyhow!(ChartError {
            status_code,
            message: message.trim().to_owned(),
        }))
    } else {
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::TcpListener,
    };

    fn table() -> FrequencyTable {
        vec![("map", 5u64), ("filter", 1)].into_iter().collect()
    }

    /// Serve one canned HTTP response and hand back the request that was received.
    async fn serve_once(response: &'static [u8]) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                request.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&request).to_string();
                if let Some(end) = text.find("\r\n\r\n") {
                    let length = text[..end]
                        .lines()
                        .find_map(|line| line.to_ascii_lowercase().strip_prefix("content-length:").map(|v| v.trim().to_owned()))
                        .and_then(|v| v.parse::<usize>().ok())
                        .unwrap_or(0);
                    if request.len() >= end + 4 + length {
                        break;
                    }
                }
                if n == 0 {
                    break;
                }
            }
            socket.write_all(response).await.unwrap();
            socket.shutdown().await.unwrap();
            String::from_utf8_lossy(&request).to_string()
        });
        (url, handle)
    }

    #[test]
    fn test_color_for_is_deterministic() {
        let color = color_for("RxJava");
        assert_eq!(color, color_for("RxJava"));
        assert_eq!(color.len(), 7);
        assert!(color.starts_with('#'));
        assert!(color[1..].chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(color_for("map"), color_for("flatMap"));
    }

    #[test]
    fn test_hsl_to_hex() {
        assert_eq!(hsl_to_hex(0.0, 1.0, 0.5), "#ff0000");
        assert_eq!(hsl_to_hex(120.0, 1.0, 0.5), "#00ff00");
        assert_eq!(hsl_to_hex(240.0, 1.0, 0.5), "#0000ff");
        assert_eq!(hsl_to_hex(200.0, 0.0, 0.5), "#808080");
    }

    #[test]
    fn test_frequency_chart_config() {
        let config = Chart::frequency(&table(), ChartKind::Bar).to_json();
        assert_eq!(config["type"], "bar");
        assert_eq!(config["data"]["labels"][0], "map");
        assert_eq!(config["data"]["datasets"][0]["data"][0].as_f64(), Some(5.0));
        assert_eq!(config["data"]["datasets"][0]["backgroundColor"].len(), 2);
        assert_eq!(config["data"]["datasets"][0]["backgroundColor"][1], color_for("filter").as_str());
        assert_eq!(config["options"]["scales"]["yAxes"][0]["ticks"]["beginAtZero"], true);

        let horizontal = Chart::frequency(&table(), ChartKind::HorizontalBar).to_json();
        assert_eq!(horizontal["type"], "horizontalBar");
        assert_eq!(horizontal["options"]["scales"]["xAxes"][0]["ticks"]["beginAtZero"], true);
    }

    #[test]
    fn test_script_substitutes_functions() {
        let dataset = Dataset {
            label: Some(String::from("RxJS")),
            data: vec![12.5, 3.0],
            colors: vec![color_for("RxJS")],
        };
        let chart = Chart::percentage_groups(
            vec![String::from("a"), String::from("b")],
            vec![dataset],
            AxisRange::new(20.0, 10.0),
            600,
        );
        let config = chart.to_json();
        assert_eq!(config["options"]["scales"]["yAxes"][0]["ticks"]["max"].as_f64(), Some(20.0));
        assert_eq!(config["data"]["datasets"][0]["backgroundColor"], color_for("RxJS").as_str());
        let script = chart.to_script();
        assert!(script.contains(r#""callback":function (value) { return value.toFixed(0) + '%'; }"#));
        assert!(!script.contains("@@script"));
    }

    #[test]
    fn test_utilization_charts() {
        let pie = Chart::utilization_pie(30, 10);
        let config = pie.to_json();
        assert_eq!(config["type"], "pie");
        assert_eq!(config["data"]["datasets"][0]["backgroundColor"][0], USED_COLOR);
        assert!(pie.to_script().contains("context.dataset.data.reduce"));

        let stacked = Chart::utilization_stacked(
            vec![String::from("RxJava"), String::from("RxJS")],
            vec![75.0, 40.0],
            vec![25.0, 60.0],
        );
        let config = stacked.to_json();
        assert_eq!(config["data"]["datasets"].len(), 2);
        assert_eq!(config["data"]["datasets"][1]["label"], "Not being used");
        assert_eq!(config["options"]["scales"]["xAxes"][0]["stacked"], true);
        assert_eq!((stacked.width, stacked.height), (400, 200));
    }

    #[test]
    fn test_request_body() {
        let body = Chart::frequency(&table(), ChartKind::Bar).with_size(600, 400).request_body();
        assert_eq!(body["width"].as_u32(), Some(600));
        assert_eq!(body["height"].as_u32(), Some(400));
        assert_eq!(body["format"], "png");
        let chart = body["chart"].as_str().unwrap();
        assert!(json::parse(chart).unwrap()["data"]["labels"].is_array());
    }

    #[test]
    fn test_client_rejects_zero_rate() {
        assert!(Client::new(DEFAULT_BASE_URL, 0).is_err());
        assert!(Client::new("not a url", 1).is_err());
    }

    #[tokio::test]
    async fn test_render_to_file() {
        let (url, server) =
            serve_once(b"HTTP/1.1 200 OK\r\nContent-Type: image/png\r\nContent-Length: 4\r\nConnection: close\r\n\r\nPNG!").await;
        let client = Client::new(&url, 10).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let job = RenderJob::new(dir.path().join("chart.png"), Chart::utilization_pie(1, 1));
        client.render_to_file(&job).await.unwrap();
        assert_eq!(std::fs::read(dir.path().join("chart.png")).unwrap(), b"PNG!");
        let request = server.await.unwrap();
        assert!(request.starts_with("POST /chart "));
        assert!(request.contains("\"format\":\"png\""));
    }

    #[tokio::test]
    async fn test_render_error() {
        let (url, _server) = serve_once(
            b"HTTP/1.1 400 Bad Request\r\nx-quickchart-error: Invalid chart\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        )
        .await;
        let client = Client::new(&url, 10).unwrap();
        let error = client.render(&Chart::utilization_pie(1, 1)).await.unwrap_err();
        let chart_error = error.downcast_ref::<ChartError>().unwrap();
        assert_eq!(chart_error.status_code, StatusCode::BAD_REQUEST);
        assert_eq!(chart_error.message, "Invalid chart");
    }
}
