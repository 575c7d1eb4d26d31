//! Client for the Central Bank `DailyInfo` SOAP service.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use quick_xml::escape::escape;
use reqwest::{Client, header::CONTENT_TYPE};

use crate::{
    config::UpstreamConfig,
    date_codec::{self, TimestampFormat},
    error::AppError,
    exchange_rate::DateRange,
    xml::{self, RawXml},
};

const CBR_NAMESPACE: &str = "http://web.cbr.ru/";

/// Source of raw upstream documents. Injected into the facades.
#[async_trait]
pub trait RateSource: Send + Sync {
    async fn list_currencies(&self) -> Result<RawXml, AppError>;
    async fn rates_on_date(&self, on: NaiveDateTime) -> Result<RawXml, AppError>;
    async fn rate_history(&self, range: &DateRange, code: &str) -> Result<RawXml, AppError>;
}

pub struct CbrClient {
    client: Client,
    endpoint: String,
    on_date_format: TimestampFormat,
    dynamic_format: TimestampFormat,
}

impl CbrClient {
    pub fn new(config: &UpstreamConfig) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            on_date_format: config.on_date_format,
            dynamic_format: config.dynamic_format,
        })
    }

    async fn call(&self, operation: &str, params: &[(&str, String)]) -> Result<RawXml, AppError> {
        log::debug!("Calling {} at {}", operation, self.endpoint);

        let response = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "text/xml; charset=utf-8")
            .header("SOAPAction", format!("\"{CBR_NAMESPACE}{operation}\""))
            .body(envelope(operation, params))
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            let fault = fault_string(&text)
                .map(|fault| format!(": {fault}"))
                .unwrap_or_default();
            return Err(AppError::UpstreamUnavailable(format!(
                "{operation} returned {status}{fault}"
            )));
        }

        Ok(RawXml::from(text))
    }
}

#[async_trait]
impl RateSource for CbrClient {
    async fn list_currencies(&self) -> Result<RawXml, AppError> {
        self.call("EnumValutesXML", &[("Seld", "false".to_string())])
            .await
    }

    async fn rates_on_date(&self, on: NaiveDateTime) -> Result<RawXml, AppError> {
        self.call("GetCursOnDateXML", &[("On_date", self.on_date_format.encode(on))])
            .await
    }

    async fn rate_history(&self, range: &DateRange, code: &str) -> Result<RawXml, AppError> {
        let params = [
            (
                "FromDate",
                date_codec::to_upstream_format(range.from(), self.dynamic_format),
            ),
            (
                "ToDate",
                date_codec::to_upstream_format(range.to(), self.dynamic_format),
            ),
            ("ValutaCode", code.to_string()),
        ];
        self.call("GetCursDynamicXML", &params).await
    }
}

fn envelope(operation: &str, params: &[(&str, String)]) -> String {
    let body: String = params
        .iter()
        .map(|(name, value)| format!("<{name}>{}</{name}>", escape(value.as_str())))
        .collect();

    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<soap:Envelope xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"
  xmlns:xsd="http://www.w3.org/2001/XMLSchema"
  xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/">
  <soap:Body>
    <{operation} xmlns="{CBR_NAMESPACE}">{body}</{operation}>
  </soap:Body>
</soap:Envelope>"#
    )
}

fn fault_string(body: &str) -> Option<String> {
    let doc = xml::parse(&RawXml::from(body)).ok()?;
    let fault = doc.find("faultstring")?.text();
    (!fault.is_empty()).then(|| fault.to_string())
}
