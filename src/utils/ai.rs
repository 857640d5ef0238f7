use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serenity::async_trait;
use tracing::debug;

use crate::{
	config::{constants::GENERATE_ENDPOINT, settings::BackendSection, types::Params},
	error::GenerationError,
};

#[derive(Clone, Debug, PartialEq)]
pub struct GenerationRequest {
	pub prompt: String,
	pub params: Params,
	pub stopping_strings: Vec<String>,
}

#[async_trait]
pub trait TextGenerator: Send + Sync {
	async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationError>;
}

#[derive(Serialize)]
struct GenerateBody<'a> {
	prompt: &'a str,
	max_new_tokens: u32,
	stopping_strings: &'a [String],
	#[serde(flatten)]
	params: &'a Params,
}

#[derive(Deserialize)]
struct GenerateResponse {
	results: Vec<GeneratedText>,
}

#[derive(Deserialize)]
struct GeneratedText {
	text: String,
}

/// Client for text-generation-webui's blocking generate API.
pub struct OobaClient {
	http: Client,
	endpoint: String,
	max_new_tokens: u32,
}

impl OobaClient {
	pub fn new(backend: &BackendSection) -> Result<Self, GenerationError> {
		let mut builder = Client::builder();
		if let Some(secs) = backend.timeout_secs {
			builder = builder.timeout(Duration::from_secs(secs));
		}
		Ok(Self {
			http: builder.build()?,
			endpoint: format!(
				"{}{GENERATE_ENDPOINT}",
				backend.base_url.trim_end_matches('/')
			),
			max_new_tokens: backend.max_new_tokens,
		})
	}

	#[must_use]
	pub fn endpoint(&self) -> &str {
		&self.endpoint
	}
}

#[async_trait]
impl TextGenerator for OobaClient {
	async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationError> {
		let body = GenerateBody {
			prompt: &request.prompt,
			max_new_tokens: self.max_new_tokens,
			stopping_strings: &request.stopping_strings,
			params: &request.params,
		};
		debug!("Submitting {} prompt bytes ({})", request.prompt.len(), request.params);
		let resp = self.http.post(&self.endpoint).json(&body).send().await?;
		if !resp.status().is_success() {
			return Err(GenerationError::Status(resp.status().as_u16()));
		}
		resp.json::<GenerateResponse>()
			.await?
			.results
			.into_iter()
			.next()
			.map(|result| result.text)
			.ok_or(GenerationError::Empty)
	}
}
