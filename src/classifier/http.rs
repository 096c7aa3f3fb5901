//! # HTTP Classifier
//!
//! Sends each frame to a model server and reads the label back.
//!
//! ## Protocol
//!
//! The frame is encoded as PNG and embedded as a data URL in a JSON body:
//!
//! ```text
//! POST <endpoint>
//! {"model": "...", "image": "data:image/png;base64,iVBORw0KGgo..."}
//! ```
//!
//! | Response | Prediction |
//! |----------|------------|
//! | 2xx with `{"label": "..."}` | `Label` |
//! | 2xx without a label | `NotReady` |
//! | 503 Service Unavailable | `NotReady` (model still loading) |
//! | anything else, or a network error | classifier error, frame skipped |

use std::io::Cursor;
use std::time::Duration;

use base64::{Engine as _, engine::general_purpose};
use image::{DynamicImage, GrayImage, ImageFormat, RgbaImage};
use pixel_resample::{PixelBuffer, PixelFormat, ScaleTarget};
use reqwest::StatusCode;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Classifier, Prediction};
use crate::error::{PipelineError, PipelineResult};

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Serialize)]
struct ClassifyRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    image: String,
}

#[derive(Debug, Deserialize)]
struct ClassifyResponse {
    label: Option<String>,
}

/// Classifier backed by a model server.
pub struct HttpClassifier {
    client: Client,
    endpoint: String,
    model: Option<String>,
    input: ScaleTarget,
}

impl HttpClassifier {
    pub fn new(endpoint: impl Into<String>, input: ScaleTarget) -> PipelineResult<Self> {
        Self::with_timeout(endpoint, input, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(
        endpoint: impl Into<String>,
        input: ScaleTarget,
        timeout: Duration,
    ) -> PipelineResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PipelineError::classifier(format!("building HTTP client: {e}")))?;
        Ok(Self::with_client(client, endpoint, input))
    }

    /// Uses a preconfigured client (proxies, TLS roots, headers).
    pub fn with_client(client: Client, endpoint: impl Into<String>, input: ScaleTarget) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            model: None,
            input,
        }
    }

    /// Model name sent with each request.
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

/// Encodes a frame as a `data:image/png;base64,...` URL.
pub fn png_data_url(frame: &PixelBuffer) -> PipelineResult<String> {
    let (width, height) = (frame.width(), frame.height());
    let packed = frame.to_packed_vec();
    let too_short = || PipelineError::classifier("frame does not fill its declared size");

    let image = match frame.format() {
        PixelFormat::Gray8 => {
            DynamicImage::ImageLuma8(GrayImage::from_raw(width, height, packed).ok_or_else(too_short)?)
        }
        format => {
            let mut rgba = packed;
            for px in rgba.chunks_exact_mut(4) {
                let [a, b, c, d] = [px[0], px[1], px[2], px[3]];
                let reordered = match format {
                    PixelFormat::Bgra8888 => [c, b, a, d],
                    PixelFormat::Argb8888 => [b, c, d, a],
                    _ => [a, b, c, d],
                };
                px.copy_from_slice(&reordered);
            }
            DynamicImage::ImageRgba8(RgbaImage::from_raw(width, height, rgba).ok_or_else(too_short)?)
        }
    };

    let mut png = Cursor::new(Vec::new());
    image.write_to(&mut png, ImageFormat::Png)?;
    let encoded = general_purpose::STANDARD.encode(png.into_inner());
    Ok(format!("data:image/png;base64,{encoded}"))
}

impl Classifier for HttpClassifier {
    fn input_size(&self) -> ScaleTarget {
        self.input
    }

    fn classify(&mut self, frame: &PixelBuffer) -> PipelineResult<Prediction> {
        let body = ClassifyRequest {
            model: self.model.as_deref(),
            image: png_data_url(frame)?,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .map_err(|e| PipelineError::classifier(format!("request to {} failed: {e}", self.endpoint)))?;

        let status = response.status();
        debug!(endpoint = %self.endpoint, %status, "classifier responded");
        if status == StatusCode::SERVICE_UNAVAILABLE {
            return Ok(Prediction::NotReady);
        }
        if !status.is_success() {
            let detail = response.text().unwrap_or_default();
            return Err(PipelineError::classifier(format!(
                "{} returned {status}: {detail}",
                self.endpoint
            )));
        }

        let parsed: ClassifyResponse = response
            .json()
            .map_err(|e| PipelineError::classifier(format!("malformed response: {e}")))?;
        Ok(parsed.label.map_or(Prediction::NotReady, Prediction::Label))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::thread;

    /// Serves one canned HTTP response and returns the request body it saw.
    fn one_shot_server(status: &'static str, body: &'static str) -> (String, thread::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/classify", listener.local_addr().unwrap());
        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut content_length = 0;
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).unwrap();
                if line == "\r\n" {
                    break;
                }
                if let Some(value) = line.to_ascii_lowercase().strip_prefix("content-length:") {
                    content_length = value.trim().parse().unwrap();
                }
            }
            let mut request = vec![0u8; content_length];
            reader.read_exact(&mut request).unwrap();

            let mut stream = stream;
            write!(
                stream,
                "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            )
            .unwrap();
            String::from_utf8(request).unwrap()
        });
        (url, handle)
    }

    fn local_classifier(url: String) -> HttpClassifier {
        let client = Client::builder().no_proxy().build().unwrap();
        HttpClassifier::with_client(client, url, ScaleTarget::new(2, 2))
    }

    fn frame() -> PixelBuffer {
        PixelBuffer::from_packed(2, 2, PixelFormat::Bgra8888, [0, 0, 255, 255].repeat(4)).unwrap()
    }

    #[test]
    fn test_label_response() {
        let (url, server) = one_shot_server("200 OK", r#"{"label":"fire truck"}"#);
        let mut classifier = local_classifier(url).model("inception-v3");
        assert_eq!(classifier.classify(&frame()).unwrap(), Prediction::label("fire truck"));

        let request: serde_json::Value = serde_json::from_str(&server.join().unwrap()).unwrap();
        assert_eq!(request["model"], "inception-v3");
        assert!(request["image"].as_str().unwrap().starts_with("data:image/png;base64,"));
    }

    #[test]
    fn test_service_unavailable_is_not_ready() {
        let (url, server) = one_shot_server("503 Service Unavailable", r#"{"error":"loading"}"#);
        let mut classifier = local_classifier(url);
        assert_eq!(classifier.classify(&frame()).unwrap(), Prediction::NotReady);
        server.join().unwrap();
    }

    #[test]
    fn test_missing_label_is_not_ready() {
        let (url, server) = one_shot_server("200 OK", r#"{"status":"warming up"}"#);
        let mut classifier = local_classifier(url);
        assert_eq!(classifier.classify(&frame()).unwrap(), Prediction::NotReady);
        server.join().unwrap();
    }

    #[test]
    fn test_server_error_skips_frame() {
        let (url, server) = one_shot_server("500 Internal Server Error", r#"{}"#);
        let mut classifier = local_classifier(url);
        let err = classifier.classify(&frame()).unwrap_err();
        assert!(err.is_frame_local());
        server.join().unwrap();
    }

    #[test]
    fn test_png_data_url_decodes_back() {
        let url = png_data_url(&frame()).unwrap();
        let png = general_purpose::STANDARD
            .decode(url.trim_start_matches("data:image/png;base64,"))
            .unwrap();
        let decoded = image::load_from_memory(&png).unwrap().to_rgba8();
        assert_eq!(decoded.get_pixel(1, 1).0, [255, 0, 0, 255]);
    }
}
