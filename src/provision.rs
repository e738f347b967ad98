//! Runs create and delete over the entities of a metadata document.

use tracing::{info, warn};

use crate::augment::{apply, connection_extension, prepare_entity, without_role};
use crate::cli::Mode;
use crate::config::Settings;
use crate::error::ProvisionError;
use crate::filter;
use crate::model::metadata::{EntityDescriptor, Role};
use crate::naming::{base_name, NameRegistry};
use crate::result::{Action, Connection, EntityOutcome, RunReport};
use crate::transport::ConnectionManager;

/// Per-run state: settings, friendly names handed out so far and the
/// connection manager every call goes through.
pub struct Provisioner<'a, C: ConnectionManager> {
    settings: &'a Settings,
    names: NameRegistry,
    manager: C,
}

impl<'a, C: ConnectionManager> Provisioner<'a, C> {
    pub fn new(settings: &'a Settings, manager: C) -> Self {
        Self {
            settings,
            names: NameRegistry::default(),
            manager,
        }
    }

    pub fn manager(&self) -> &C {
        &self.manager
    }

    /// Processes `entities` in document order, recording every outcome in
    /// `report` as it happens. Stops at the first failed call; connections
    /// saved or deleted before it stay applied.
    pub fn run(
        &mut self,
        mode: Mode,
        entities: &[EntityDescriptor],
        report: &mut RunReport,
    ) -> Result<(), ProvisionError> {
        for entity in entities {
            let entity_id = entity.entity_id();
            if filter::skip(entity_id, &self.settings.include, &self.settings.exclude) {
                info!(entity = entity_id, "skipped by include/exclude settings");
                report.entities.push(EntityOutcome::skipped(entity_id));
                continue;
            }
            if entity.roles().is_empty() {
                warn!(entity = entity_id, "no IDP or SP role; nothing to provision");
                report.entities.push(EntityOutcome::skipped(entity_id));
                continue;
            }
            let action = match mode {
                Mode::Create => Action::Saved,
                Mode::Delete => Action::Deleted,
            };
            report.entities.push(EntityOutcome {
                entity_id: entity_id.to_string(),
                action,
                connections: Vec::new(),
            });
            // the outcome pushed above is completed connection by connection
            let connections = match report.entities.last_mut() {
                Some(outcome) => &mut outcome.connections,
                None => continue,
            };
            match mode {
                Mode::Create => self.create(entity, connections)?,
                Mode::Delete => self.delete(entity, connections)?,
            }
        }
        Ok(())
    }

    fn create(
        &mut self,
        entity: &EntityDescriptor,
        done: &mut Vec<Connection>,
    ) -> Result<(), ProvisionError> {
        let entity_id = entity.entity_id();
        let mut current = prepare_entity(entity, &self.settings.preferred_protocol);
        let base = base_name(&current);
        let roles = current.roles();

        for role in &roles {
            let role = *role;
            let name = self.names.generate(&base, role);
            let connection = connection_extension(&current, role, name.clone(), self.settings);
            let xml = apply(&current, &connection).to_xml();

            self.manager.save_connection(&xml, entity_id)?;
            info!(entity = entity_id, %role, name = %name, "connection saved");
            done.push(Connection {
                role,
                name: Some(name),
            });

            // the server holds one role per connection
            if role == Role::Idp && roles.contains(&Role::Sp) {
                current = without_role(&current, Role::Idp);
            }
        }
        Ok(())
    }

    fn delete(
        &mut self,
        entity: &EntityDescriptor,
        done: &mut Vec<Connection>,
    ) -> Result<(), ProvisionError> {
        let entity_id = entity.entity_id();
        for role in entity.roles() {
            self.manager.delete_connection(entity_id, role)?;
            info!(entity = entity_id, %role, "connection deleted");
            done.push(Connection { role, name: None });
        }
        Ok(())
    }
}
