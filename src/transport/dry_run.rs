use std::io::Write;

use super::{ConnectionManager, DELETE_OPERATION, SAVE_OPERATION};
use crate::error::TransportError;
use crate::model::metadata::Role;

/// A call the dry run would have made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedCall {
    Save { entity_id: String, entity_xml: String },
    Delete { entity_id: String, role: Role },
}

/// Records every call and writes what would have been sent to `out`
/// instead of contacting the federation server.
pub struct DryRunConnectionManager<W: Write> {
    out: W,
    calls: Vec<RecordedCall>,
}

impl<W: Write> DryRunConnectionManager<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            calls: Vec::new(),
        }
    }

    pub fn calls(&self) -> &[RecordedCall] {
        &self.calls
    }

    fn emit(
        &mut self,
        operation: &'static str,
        entity_id: &str,
        text: &str,
    ) -> Result<(), TransportError> {
        writeln!(self.out, "{}", text).map_err(|e| TransportError::Http {
            operation,
            entity_id: entity_id.to_string(),
            message: e.to_string(),
        })
    }
}

impl<W: Write> ConnectionManager for DryRunConnectionManager<W> {
    fn save_connection(&mut self, entity_xml: &str, entity_id: &str) -> Result<(), TransportError> {
        self.emit(SAVE_OPERATION, entity_id, entity_xml)?;
        self.calls.push(RecordedCall::Save {
            entity_id: entity_id.to_string(),
            entity_xml: entity_xml.to_string(),
        });
        Ok(())
    }

    fn delete_connection(&mut self, entity_id: &str, role: Role) -> Result<(), TransportError> {
        let line = format!("<!-- {} {} {} -->", DELETE_OPERATION, role, entity_id);
        self.emit(DELETE_OPERATION, entity_id, &line)?;
        self.calls.push(RecordedCall::Delete {
            entity_id: entity_id.to_string(),
            role,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_and_prints() {
        let mut manager = DryRunConnectionManager::new(Vec::new());
        manager.save_connection("<EntityDescriptor/>", "urn:a").unwrap();
        manager.delete_connection("urn:b", Role::Sp).unwrap();

        assert_eq!(manager.calls().len(), 2);
        assert_eq!(
            manager.calls()[1],
            RecordedCall::Delete {
                entity_id: "urn:b".to_string(),
                role: Role::Sp
            }
        );
        let printed = String::from_utf8(manager.out.clone()).unwrap();
        assert_eq!(
            printed,
            "<EntityDescriptor/>\n<!-- deleteConnection SP urn:b -->\n"
        );
    }
}
