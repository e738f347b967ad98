//! Calls into the federation server's connection management web service.

pub mod dry_run;
pub mod soap;

use quick_xml::escape::escape;

use crate::error::TransportError;
use crate::model::metadata::Role;

pub const SAVE_OPERATION: &str = "saveConnection";
pub const DELETE_OPERATION: &str = "deleteConnection";

/// Exact body the service returns when a connection was saved.
pub const SAVE_ACK: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8"?>"#,
    r#"<soapenv:Envelope xmlns:soapenv="http://www.w3.org/2003/05/soap-envelope" xmlns:xsd="http://www.w3.org/2001/XMLSchema" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">"#,
    r#"<soapenv:Body><saveConnectionResponse soapenv:encodingStyle="http://www.w3.org/2003/05/soap-encoding"/></soapenv:Body>"#,
    r#"</soapenv:Envelope>"#
);

/// Exact body the service returns when a connection was deleted.
pub const DELETE_ACK: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8"?>"#,
    r#"<soapenv:Envelope xmlns:soapenv="http://www.w3.org/2003/05/soap-envelope" xmlns:xsd="http://www.w3.org/2001/XMLSchema" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">"#,
    r#"<soapenv:Body><deleteConnectionResponse soapenv:encodingStyle="http://www.w3.org/2003/05/soap-encoding"/></soapenv:Body>"#,
    r#"</soapenv:Envelope>"#
);

/// The two remote operations the provisioning run needs.
///
/// Implementations must treat anything but the operation's acknowledgement
/// as a failure; callers abort the run on the first error.
pub trait ConnectionManager {
    /// Creates or overwrites the connection described by `entity_xml`.
    fn save_connection(&mut self, entity_xml: &str, entity_id: &str) -> Result<(), TransportError>;

    fn delete_connection(&mut self, entity_id: &str, role: Role) -> Result<(), TransportError>;
}

/// SOAP 1.2 envelope around `body`.
pub fn envelope(body: &str) -> String {
    format!(
        "<s:Envelope xmlns:s=\"http://www.w3.org/2003/05/soap-envelope\">\n  <s:Header></s:Header>\n  <s:Body>{}</s:Body>\n</s:Envelope>",
        body
    )
}

/// Request body of `saveConnection`, overwriting any existing connection.
pub fn save_body(entity_xml: &str) -> String {
    format!(
        "<saveConnection><param0>{}</param0><param1>true</param1></saveConnection>",
        escape(entity_xml)
    )
}

pub fn delete_body(entity_id: &str, role: Role) -> String {
    format!(
        "<deleteConnection><param0>{}</param0><param1>{}</param1></deleteConnection>",
        escape(entity_id),
        role.remote_name()
    )
}

/// Checks a response body against the expected acknowledgement.
pub fn acknowledged(
    operation: &'static str,
    entity_id: &str,
    expected: &str,
    body: String,
) -> Result<(), TransportError> {
    if body == expected {
        Ok(())
    } else {
        Err(TransportError::Rejected {
            operation,
            entity_id: entity_id.to_string(),
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_body_escapes_document() {
        let body = save_body(r#"<md:EntityDescriptor entityID="a&b"/>"#);
        assert_eq!(
            body,
            "<saveConnection><param0>&lt;md:EntityDescriptor entityID=&quot;a&amp;b&quot;/&gt;</param0><param1>true</param1></saveConnection>"
        );
    }

    #[test]
    fn delete_body_names_role() {
        assert_eq!(
            delete_body("https://sp.example.org/?a=1&b=2", Role::Sp),
            "<deleteConnection><param0>https://sp.example.org/?a=1&amp;b=2</param0><param1>SP</param1></deleteConnection>"
        );
    }

    #[test]
    fn envelope_wraps_body() {
        let env = envelope("<x/>");
        assert!(env.starts_with(r#"<s:Envelope xmlns:s="http://www.w3.org/2003/05/soap-envelope">"#));
        assert!(env.contains("<s:Body><x/></s:Body>"));
    }

    #[test]
    fn only_exact_ack_is_accepted() {
        assert!(acknowledged(SAVE_OPERATION, "urn:x", SAVE_ACK, SAVE_ACK.to_string()).is_ok());
        let padded = format!("{}\n", SAVE_ACK);
        let err = acknowledged(SAVE_OPERATION, "urn:x", SAVE_ACK, padded).unwrap_err();
        assert!(matches!(err, TransportError::Rejected { operation: "saveConnection", .. }));
        assert!(acknowledged(DELETE_OPERATION, "urn:x", DELETE_ACK, SAVE_ACK.to_string()).is_err());
    }
}
