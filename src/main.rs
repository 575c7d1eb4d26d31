use std::sync::Arc;

use actix_web::{App, HttpServer, middleware::Logger, web};
use anyhow::Result;
use config::Config;
use env_logger::Env;
use service::RatesService;
use upstream::CbrClient;

mod config;
mod date_codec;
mod error;
mod exchange_rate;
mod mapper;
mod rest;
mod service;
mod soap;
mod upstream;
mod val_curs;
mod xml;

#[actix_web::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let config = Config::from_env()?;
    let client = CbrClient::new(&config.upstream)?;
    let service = web::Data::new(RatesService::new(Arc::new(client)));

    let cors_origins = config.cors_origins.clone();

    log::info!("Upstream endpoint {}", config.upstream.endpoint);
    log::info!("Listening on http://{}", config.listen_addr);
    log::info!("-> currencies: GET /valutes");
    log::info!("-> dynamics: GET /valute?code=R01235&fromDate=01.03.2023&toDate=15.03.2023");
    log::info!("-> SOAP: POST /soap, WSDL at GET /soap?wsdl");

    HttpServer::new(move || {
        App::new()
            .wrap(rest::cors(&cors_origins))
            .wrap(Logger::default())
            .app_data(service.clone())
            .configure(rest::configure)
            .configure(soap::configure)
    })
    .bind(config.listen_addr.as_str())?
    .run()
    .await?;

    Ok(())
}
