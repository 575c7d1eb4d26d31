//! SOAP facade with a simplified WSDL.
//!
//! Payloads are the same JSON the REST facade returns, carried as string
//! elements. Faults only expose fixed fault strings; details go to the log.

use actix_web::{HttpRequest, HttpResponse, web};
use chrono::Local;
use quick_xml::escape::escape;
use serde::Serialize;

use crate::{
    error::AppError,
    exchange_rate::{DateRange, HistoryPoint},
    service::RatesService,
    xml::{self, Element, RawXml},
};

pub const SERVICE_NAMESPACE: &str = "urn:valut:rates";
const SOAP_ENV_NAMESPACE: &str = "http://schemas.xmlsoap.org/soap/envelope/";
const SOAP_PATH: &str = "/soap";

const MALFORMED_REQUEST: &str = "Malformed SOAP request";
const UNKNOWN_OPERATION: &str = "Unknown operation";
const INVALID_PARAMS: &str = "Specify code, fromDate, toDate (dd.MM.yyyy)";
const VALUTES_FAILED: &str = "Failed to get currencies";
const DYNAMIC_FAILED: &str = "Failed to get currency dynamics";

#[derive(Debug, Clone, Copy, PartialEq)]
enum FaultCode {
    Client,
    Server,
}

impl FaultCode {
    fn as_str(self) -> &'static str {
        match self {
            FaultCode::Client => "soap:Client",
            FaultCode::Server => "soap:Server",
        }
    }
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource(SOAP_PATH)
            .route(web::get().to(wsdl))
            .route(web::post().to(dispatch)),
    );
}

async fn wsdl(req: HttpRequest) -> HttpResponse {
    let info = req.connection_info();
    let location = format!("{}://{}{}", info.scheme(), info.host(), SOAP_PATH);

    HttpResponse::Ok()
        .content_type("text/xml; charset=utf-8")
        .body(WSDL.replace("{location}", &location))
}

async fn dispatch(service: web::Data<RatesService>, body: String) -> HttpResponse {
    let document = match xml::parse(&RawXml::from(body)) {
        Ok(document) => document,
        Err(err) => {
            log::warn!("{MALFORMED_REQUEST}: {err}");
            return fault(FaultCode::Client, MALFORMED_REQUEST);
        }
    };
    let Some(request) = document.find("Body").and_then(|body| body.children().next()) else {
        log::warn!("{MALFORMED_REQUEST}: no operation in Body");
        return fault(FaultCode::Client, MALFORMED_REQUEST);
    };

    match request.name() {
        "getValutes" => {
            let result = service.list_currencies(Local::now().naive_local()).await;
            respond("getValutesResponse", "valutes", result, VALUTES_FAILED)
        }
        "getValute" => {
            let result = get_valute(&service, request).await;
            respond("getValuteResponse", "dynamic", result, DYNAMIC_FAILED)
        }
        other => {
            log::warn!("{UNKNOWN_OPERATION}: {other}");
            fault(FaultCode::Client, UNKNOWN_OPERATION)
        }
    }
}

async fn get_valute(
    service: &RatesService,
    request: &Element,
) -> Result<Vec<HistoryPoint>, AppError> {
    let param = |name: &str| {
        request
            .child_text(name)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| AppError::InvalidInput(format!("{name} is required")))
    };
    let code = param("code")?;
    let range = DateRange::parse(param("fromDate")?, param("toDate")?)?;

    service.get_history(code, range).await
}

fn respond<T: Serialize>(
    operation: &str,
    field: &str,
    result: Result<T, AppError>,
    failed: &'static str,
) -> HttpResponse {
    let json = result.and_then(|payload| Ok(serde_json::to_string(&payload)?));

    match json {
        Ok(json) => envelope(
            HttpResponse::Ok(),
            &format!(
                concat!(
                    r#"<tns:{operation} xmlns:tns="{namespace}">"#,
                    "<{field}>{payload}</{field}></tns:{operation}>",
                ),
                operation = operation,
                namespace = SERVICE_NAMESPACE,
                field = field,
                payload = escape(json.as_str()),
            ),
        ),
        Err(err) if err.is_client_error() => {
            log::warn!("{operation}: {err}");
            fault(FaultCode::Client, INVALID_PARAMS)
        }
        Err(err) => {
            log::error!("{operation}: {err}");
            fault(FaultCode::Server, failed)
        }
    }
}

fn fault(code: FaultCode, message: &str) -> HttpResponse {
    envelope(
        HttpResponse::InternalServerError(),
        &format!(
            "<soap:Fault><faultcode>{}</faultcode><faultstring>{}</faultstring></soap:Fault>",
            code.as_str(),
            escape(message)
        ),
    )
}

fn envelope(mut builder: actix_web::HttpResponseBuilder, body: &str) -> HttpResponse {
    builder.content_type("text/xml; charset=utf-8").body(format!(
        concat!(
            r#"<?xml version="1.0" encoding="utf-8"?>"#,
            r#"<soap:Envelope xmlns:soap="{namespace}">"#,
            "<soap:Body>{body}</soap:Body></soap:Envelope>",
        ),
        namespace = SOAP_ENV_NAMESPACE,
        body = body,
    ))
}

const WSDL: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<definitions name="ValutService"
  targetNamespace="urn:valut:rates"
  xmlns="http://schemas.xmlsoap.org/wsdl/"
  xmlns:soap="http://schemas.xmlsoap.org/wsdl/soap/"
  xmlns:tns="urn:valut:rates"
  xmlns:xsd="http://www.w3.org/2001/XMLSchema">
  <types>
    <xsd:schema targetNamespace="urn:valut:rates" elementFormDefault="unqualified">
      <xsd:element name="getValutes">
        <xsd:complexType><xsd:sequence/></xsd:complexType>
      </xsd:element>
      <xsd:element name="getValutesResponse">
        <xsd:complexType><xsd:sequence>
          <xsd:element name="valutes" type="xsd:string"/>
        </xsd:sequence></xsd:complexType>
      </xsd:element>
      <xsd:element name="getValute">
        <xsd:complexType><xsd:sequence>
          <xsd:element name="code" type="xsd:string"/>
          <xsd:element name="fromDate" type="xsd:string"/>
          <xsd:element name="toDate" type="xsd:string"/>
        </xsd:sequence></xsd:complexType>
      </xsd:element>
      <xsd:element name="getValuteResponse">
        <xsd:complexType><xsd:sequence>
          <xsd:element name="dynamic" type="xsd:string"/>
        </xsd:sequence></xsd:complexType>
      </xsd:element>
    </xsd:schema>
  </types>
  <message name="getValutesRequest"><part name="parameters" element="tns:getValutes"/></message>
  <message name="getValutesResponse">
    <part name="parameters" element="tns:getValutesResponse"/>
  </message>
  <message name="getValuteRequest"><part name="parameters" element="tns:getValute"/></message>
  <message name="getValuteResponse">
    <part name="parameters" element="tns:getValuteResponse"/>
  </message>
  <portType name="ValutPortType">
    <operation name="getValutes">
      <input message="tns:getValutesRequest"/>
      <output message="tns:getValutesResponse"/>
    </operation>
    <operation name="getValute">
      <input message="tns:getValuteRequest"/>
      <output message="tns:getValuteResponse"/>
    </operation>
  </portType>
  <binding name="ValutBinding" type="tns:ValutPortType">
    <soap:binding style="document" transport="http://schemas.xmlsoap.org/soap/http"/>
    <operation name="getValutes">
      <soap:operation soapAction="urn:valut:rates#getValutes"/>
      <input><soap:body use="literal"/></input>
      <output><soap:body use="literal"/></output>
    </operation>
    <operation name="getValute">
      <soap:operation soapAction="urn:valut:rates#getValute"/>
      <input><soap:body use="literal"/></input>
      <output><soap:body use="literal"/></output>
    </operation>
  </binding>
  <service name="ValutService">
    <port name="ValutPort" binding="tns:ValutBinding">
      <soap:address location="{location}"/>
    </port>
  </service>
</definitions>"#;
