use std::fmt;
use std::mem;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::exception::SqlExceptionHelper;
use super::registry::ResourceRegistry;
use super::release::{should_release, ReleaseMode};
use super::{Connection, ConnectionProvider};
use crate::error::{Result, SqlshapeError};

/// Who owns the physical connection's lifecycle.
enum Ownership {
    /// Obtained from and returned to the provider.
    Managed(Arc<dyn ConnectionProvider>),
    /// Handed in by the caller, who stays responsible for closing it.
    UserSupplied,
}

enum Physical {
    Disconnected,
    Connected(Box<dyn Connection>),
    /// Terminal.
    Closed,
}

/// Token for a connection handed out by [`LogicalConnection::borrow_connection`].
/// It stops resolving once the physical connection is released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionBorrow(u64);

/// Serialized form of a logical connection: two flags, nothing physical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializedConnection {
    pub user_supplied: bool,
    pub closed: bool,
}

/// Lifecycle wrapper around one physical connection.
///
/// A managed connection is acquired lazily on first use and may be released
/// and re-acquired according to the release mode. A user-supplied connection
/// always behaves as [`ReleaseMode::OnClose`] and is never closed here.
pub struct LogicalConnection {
    ownership: Ownership,
    physical: Physical,
    mode: ReleaseMode,
    registry: ResourceRegistry,
    releases_enabled: bool,
    borrow: Option<ConnectionBorrow>,
    next_borrow: u64,
    exceptions: SqlExceptionHelper,
}

impl LogicalConnection {
    pub fn managed(provider: Arc<dyn ConnectionProvider>, mode: ReleaseMode) -> Self {
        Self::build(Ownership::Managed(provider), Physical::Disconnected, mode)
    }

    pub fn user_supplied(connection: Box<dyn Connection>) -> Self {
        Self::build(
            Ownership::UserSupplied,
            Physical::Connected(connection),
            ReleaseMode::OnClose,
        )
    }

    fn build(ownership: Ownership, physical: Physical, mode: ReleaseMode) -> Self {
        let mode = match ownership {
            Ownership::UserSupplied => ReleaseMode::OnClose,
            Ownership::Managed(_) => mode,
        };
        Self {
            ownership,
            physical,
            mode,
            registry: ResourceRegistry::new(),
            releases_enabled: true,
            borrow: None,
            next_borrow: 1,
            exceptions: SqlExceptionHelper,
        }
    }

    pub fn is_user_supplied(&self) -> bool {
        matches!(self.ownership, Ownership::UserSupplied)
    }

    pub fn is_open(&self) -> bool {
        !matches!(self.physical, Physical::Closed)
    }

    pub fn is_physically_connected(&self) -> bool {
        matches!(self.physical, Physical::Connected(_))
    }

    /// Effective release mode.
    pub fn release_mode(&self) -> ReleaseMode {
        self.mode
    }

    pub fn releases_enabled(&self) -> bool {
        self.releases_enabled
    }

    pub fn registry(&self) -> &ResourceRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ResourceRegistry {
        &mut self.registry
    }

    /// The physical connection, acquiring one from the provider if needed.
    pub fn connection(&mut self) -> Result<&mut (dyn Connection + 'static)> {
        if matches!(self.physical, Physical::Disconnected) {
            self.acquire()?;
        }
        match &mut self.physical {
            Physical::Connected(connection) => Ok(connection.as_mut()),
            Physical::Closed => Err(SqlshapeError::assertion("Logical connection is closed")),
            Physical::Disconnected => Err(SqlshapeError::assertion(
                "User-supplied connection is disconnected; reconnect it first",
            )),
        }
    }

    fn acquire(&mut self) -> Result<()> {
        let Ownership::Managed(provider) = &self.ownership else {
            return Ok(());
        };
        debug!("Obtaining JDBC connection");
        let connection = provider
            .get_connection()
            .map_err(|e| self.exceptions.convert(e, "Could not open connection", None))?;
        debug!("Obtained JDBC connection");
        self.physical = Physical::Connected(connection);
        Ok(())
    }

    /// Give the physical connection back to the provider after closing all
    /// registered resources. A user-supplied connection is kept.
    pub fn release_connection(&mut self) -> Result<()> {
        if !self.is_physically_connected() {
            return Ok(());
        }
        let Ownership::Managed(provider) = &self.ownership else {
            debug!("Not releasing user-supplied connection");
            return Ok(());
        };
        debug!("Releasing JDBC connection");
        self.registry.release_resources();
        self.borrow = None;
        if let Physical::Connected(connection) = mem::replace(&mut self.physical, Physical::Disconnected) {
            provider
                .close_connection(connection)
                .map_err(|e| self.exceptions.convert(e, "Could not close connection", None))?;
        }
        debug!("Released JDBC connection");
        Ok(())
    }

    fn in_auto_commit(&self) -> bool {
        match &self.physical {
            Physical::Connected(connection) => connection.auto_commit().unwrap_or_else(|e| {
                debug!("Unable to check auto-commit status: {}", e);
                false
            }),
            _ => false,
        }
    }

    fn holds_resources(&self) -> bool {
        self.registry.has_registered_resources() || self.borrow.is_some()
    }

    /// Apply the release policy after a statement has run.
    pub fn after_statement(&mut self, transaction_in_progress: bool) -> Result<()> {
        if !self.is_physically_connected() {
            return Ok(());
        }
        let in_auto_commit = self.in_auto_commit();
        if should_release(
            self.mode,
            self.holds_resources(),
            self.releases_enabled,
            in_auto_commit,
            transaction_in_progress,
        ) {
            return self.release_connection();
        }
        if self.mode == ReleaseMode::AfterStatement {
            if !self.releases_enabled {
                debug!("Skipping aggressive release due to manual disabling");
            } else if self.registry.has_registered_resources() {
                debug!("Skipping aggressive release due to registered resources");
            } else if self.borrow.is_some() {
                debug!("Skipping aggressive release due to borrowed connection");
            }
        }
        Ok(())
    }

    /// Apply the release policy at transaction completion. Resources still
    /// registered at this point are closed first.
    pub fn after_transaction(&mut self) -> Result<()> {
        if !self.mode.releases_at_transaction_end() {
            debug!("Transaction completed with on_close release mode; close the connection to release JDBC resources");
            return Ok(());
        }
        if self.registry.has_registered_resources() {
            info!("Forcing container resource cleanup on transaction completion");
            self.registry.release_resources();
        }
        if self.releases_enabled && self.borrow.is_none() {
            self.release_connection()?;
        }
        Ok(())
    }

    pub fn disable_releases(&mut self) {
        debug!("Disabling connection releases");
        self.releases_enabled = false;
    }

    pub fn enable_releases(&mut self) {
        debug!("(Re)enabling connection releases");
        self.releases_enabled = true;
    }

    /// Hand out the physical connection to calling code. A second borrow
    /// before the first is released returns the same token.
    pub fn borrow_connection(&mut self) -> Result<ConnectionBorrow> {
        self.connection()?;
        if let Some(borrow) = self.borrow {
            return Ok(borrow);
        }
        let borrow = ConnectionBorrow(self.next_borrow);
        self.next_borrow += 1;
        self.borrow = Some(borrow);
        Ok(borrow)
    }

    /// The borrowed connection, while the borrow is still valid.
    pub fn borrowed(&mut self, borrow: &ConnectionBorrow) -> Option<&mut (dyn Connection + 'static)> {
        if self.borrow != Some(*borrow) {
            return None;
        }
        match &mut self.physical {
            Physical::Connected(connection) => Some(connection.as_mut()),
            _ => None,
        }
    }

    /// End a borrow early.
    pub fn release_borrow(&mut self) {
        self.borrow = None;
    }

    pub fn is_borrowed(&self) -> bool {
        self.borrow.is_some()
    }

    /// Detach the physical connection. A user-supplied connection is handed
    /// back to the caller; a managed one goes back to the provider.
    pub fn manual_disconnect(&mut self) -> Result<Option<Box<dyn Connection>>> {
        if !self.is_open() {
            return Err(SqlshapeError::assertion(
                "Cannot manually disconnect because logical connection is already closed",
            ));
        }
        self.registry.release_resources();
        self.borrow = None;
        match self.ownership {
            Ownership::UserSupplied => match mem::replace(&mut self.physical, Physical::Disconnected) {
                Physical::Connected(connection) => Ok(Some(connection)),
                _ => Ok(None),
            },
            Ownership::Managed(_) => {
                self.release_connection()?;
                Ok(None)
            }
        }
    }

    /// Reattach after `manual_disconnect`. A user-supplied logical connection
    /// needs a new connection; a managed one must not be given one.
    pub fn manual_reconnect(&mut self, supplied: Option<Box<dyn Connection>>) -> Result<()> {
        if !self.is_open() {
            return Err(SqlshapeError::assertion(
                "Cannot manually reconnect because logical connection is already closed",
            ));
        }
        match (&self.ownership, supplied) {
            (Ownership::Managed(_), Some(_)) => Err(SqlshapeError::assertion(
                "Cannot manually reconnect unless the connection was originally supplied",
            )),
            (Ownership::Managed(_), None) => {
                debug!("Reconnect will obtain a connection lazily");
                Ok(())
            }
            (Ownership::UserSupplied, None) => Err(SqlshapeError::assertion(
                "Cannot manually reconnect a user-supplied connection without a connection",
            )),
            (Ownership::UserSupplied, Some(connection)) => {
                if self.is_physically_connected() {
                    return Err(SqlshapeError::assertion(
                        "Cannot reconnect a user-supplied connection that is still connected",
                    ));
                }
                self.physical = Physical::Connected(connection);
                debug!("Reconnected user-supplied connection");
                Ok(())
            }
        }
    }

    /// Close registered resources and end the logical connection. Returns the
    /// user-supplied connection, if any, so the caller can close it.
    pub fn close(&mut self) -> Result<Option<Box<dyn Connection>>> {
        if !self.is_open() {
            debug!("Logical connection already closed");
            return Ok(None);
        }
        debug!("Closing logical connection");
        self.registry.release_resources();
        self.borrow = None;
        let result = match self.ownership {
            Ownership::UserSupplied => match mem::replace(&mut self.physical, Physical::Disconnected) {
                Physical::Connected(connection) => Ok(Some(connection)),
                _ => Ok(None),
            },
            Ownership::Managed(_) => self.release_connection().map(|()| None),
        };
        self.physical = Physical::Closed;
        debug!("Logical connection closed");
        result
    }

    /// Whether the connection can be serialized: a user-supplied connection
    /// must be disconnected, a managed one must hold no resources.
    pub fn is_ready_for_serialization(&self) -> bool {
        match self.ownership {
            Ownership::UserSupplied => !self.is_physically_connected(),
            Ownership::Managed(_) => !self.registry.has_registered_resources(),
        }
    }

    pub fn serialize(&self) -> Result<SerializedConnection> {
        if !self.is_ready_for_serialization() {
            return Err(SqlshapeError::Serialization(
                "Cannot serialize a logical connection that is still in use".to_string(),
            ));
        }
        Ok(SerializedConnection {
            user_supplied: self.is_user_supplied(),
            closed: !self.is_open(),
        })
    }

    /// Rebuild a logical connection. It never resumes a physical connection:
    /// the result is disconnected, or closed if it was closed.
    pub fn deserialize(
        state: SerializedConnection,
        provider: Arc<dyn ConnectionProvider>,
        mode: ReleaseMode,
    ) -> Self {
        let ownership = if state.user_supplied {
            Ownership::UserSupplied
        } else {
            Ownership::Managed(provider)
        };
        let physical = if state.closed {
            Physical::Closed
        } else {
            Physical::Disconnected
        };
        Self::build(ownership, physical, mode)
    }
}

impl fmt::Debug for LogicalConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let physical = match self.physical {
            Physical::Disconnected => "disconnected",
            Physical::Connected(_) => "connected",
            Physical::Closed => "closed",
        };
        f.debug_struct("LogicalConnection")
            .field("user_supplied", &self.is_user_supplied())
            .field("physical", &physical)
            .field("mode", &self.mode)
            .field("releases_enabled", &self.releases_enabled)
            .field("borrow", &self.borrow)
            .field("registry", &self.registry)
            .finish()
    }
}
