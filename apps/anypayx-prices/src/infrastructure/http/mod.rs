//! Price Service REST Adapter
//!
//! `reqwest` implementation of the `PriceService` port.
//!
//! | Operation       | Request                                   | Response envelope          |
//! |-----------------|-------------------------------------------|----------------------------|
//! | `list_prices`   | `GET /api/prices`                         | `{"prices": [Price]}`      |
//! | `get_price`     | `GET /api/prices/{base}/{quote}[/source]` | `{"price": Price}`         |
//! | `convert_price` | `POST /api/conversions` + JSON body       | `{"conversion": Conversion}` |
//!
//! Requests carry `Authorization: Bearer <token>` only when a token is
//! configured. Failures are returned to the caller and never retried.

use std::time::Instant;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::application::ports::{PriceService, RestError};
use crate::domain::pricing::{Conversion, ConversionRequest, Price, PriceQuery};
use crate::infrastructure::config::{AuthToken, ClientConfig};
use crate::infrastructure::metrics::{self, RestOperation};

#[derive(Deserialize)]
struct PricesEnvelope {
    prices: Vec<Price>,
}

#[derive(Deserialize)]
struct PriceEnvelope {
    price: Price,
}

#[derive(Deserialize)]
struct ConversionEnvelope {
    conversion: Conversion,
}

/// HTTP client for the price service REST API.
#[derive(Debug, Clone)]
pub struct HttpPriceClient {
    client: Client,
    base_url: Url,
    token: Option<AuthToken>,
}

impl HttpPriceClient {
    /// Create a client from configuration.
    pub fn new(config: &ClientConfig) -> Result<Self, RestError> {
        let base_url = Url::parse(&config.http_api_url)
            .map_err(|e| RestError::InvalidUrl(format!("{}: {e}", config.http_api_url)))?;
        if base_url.cannot_be_a_base() {
            return Err(RestError::InvalidUrl(config.http_api_url.clone()));
        }

        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| RestError::Network(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            token: config.token.clone(),
        })
    }

    /// Base URL requests are resolved against.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, RestError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| RestError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        operation: RestOperation,
        request: RequestBuilder,
    ) -> Result<T, RestError> {
        let started = Instant::now();
        let result = self.fetch(request).await;
        metrics::record_rest_request(operation, result.is_ok(), started.elapsed());

        match &result {
            Ok(_) => tracing::debug!(
                operation = operation.as_str(),
                "Price service request succeeded"
            ),
            Err(e) => tracing::warn!(
                operation = operation.as_str(),
                error = %e,
                "Price service request failed"
            ),
        }
        result
    }

    async fn fetch<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, RestError> {
        let request = match &self.token {
            Some(token) => request.bearer_auth(token.expose()),
            None => request,
        };

        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;

        if !status.is_success() {
            return Err(RestError::Http {
                status: status.as_u16(),
                body,
            });
        }

        Ok(serde_json::from_str(&body)?)
    }
}

fn transport_error(err: reqwest::Error) -> RestError {
    if err.is_timeout() {
        RestError::Timeout
    } else {
        RestError::Network(err.to_string())
    }
}

#[async_trait]
impl PriceService for HttpPriceClient {
    async fn list_prices(&self) -> Result<Vec<Price>, RestError> {
        let url = self.endpoint(&["api", "prices"])?;
        let envelope: PricesEnvelope = self
            .execute(RestOperation::ListPrices, self.client.get(url))
            .await?;
        Ok(envelope.prices)
    }

    async fn get_price(&self, query: &PriceQuery) -> Result<Price, RestError> {
        let mut segments = vec!["api", "prices", query.base.as_str(), query.quote.as_str()];
        if let Some(source) = &query.source {
            segments.push(source.as_str());
        }
        let url = self.endpoint(&segments)?;

        let envelope: PriceEnvelope = self
            .execute(RestOperation::GetPrice, self.client.get(url))
            .await?;
        Ok(envelope.price)
    }

    async fn convert_price(&self, request: &ConversionRequest) -> Result<Conversion, RestError> {
        request.validate()?;
        let url = self.endpoint(&["api", "conversions"])?;

        let envelope: ConversionEnvelope = self
            .execute(RestOperation::ConvertPrice, self.client.post(url).json(request))
            .await?;
        Ok(envelope.conversion)
    }
}
