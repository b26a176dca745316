//! Procedures of the Hawk service and the typed client over them.
use super::{HawkInstanceNotFound, Instance, Procedure, ServiceClient, take_success};
use crate::error::{CallError, RemoteError, RpcError};
use crate::protocol::{DecodeLimits, Struct};
use crate::transport::Transport;

/// Field id of `HawkInstanceNotFound` in the instance operation results.
const INSTANCE_NOT_FOUND_FIELD: i16 = 1;

#[derive(Debug, Clone, Copy, Default)]
pub struct ListInstances;

impl Procedure for ListInstances {
    const NAME: &'static str = "listInstances";
    type Output = Vec<Instance>;

    fn args(&self) -> Struct {
        Struct::new()
    }

    fn decode_result(&self, mut result: Struct) -> Result<Vec<Instance>, RpcError> {
        Ok(take_success(&mut result)?)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ListBackends;

impl Procedure for ListBackends {
    const NAME: &'static str = "listBackends";
    type Output = Vec<String>;

    fn args(&self) -> Struct {
        Struct::new()
    }

    fn decode_result(&self, mut result: Struct) -> Result<Vec<String>, RpcError> {
        Ok(take_success(&mut result)?)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ListPlugins;

impl Procedure for ListPlugins {
    const NAME: &'static str = "listPlugins";
    type Output = Vec<String>;

    fn args(&self) -> Struct {
        Struct::new()
    }

    fn decode_result(&self, mut result: Struct) -> Result<Vec<String>, RpcError> {
        Ok(take_success(&mut result)?)
    }
}

macro_rules! instance_procedure {
    ($(#[$meta:meta])* $ty:ident, $name:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub struct $ty {
            pub name: String,
        }

        impl $ty {
            pub fn new(name: impl Into<String>) -> Self {
                Self { name: name.into() }
            }
        }

        impl Procedure for $ty {
            const NAME: &'static str = $name;
            type Output = ();

            fn args(&self) -> Struct {
                Struct::new().with_field(1, self.name.as_str())
            }

            fn decode_result(&self, result: Struct) -> Result<(), RpcError> {
                instance_not_found(result, &self.name)
            }
        }
    };
}

instance_procedure!(
    /// Starts indexing with an instance.
    StartInstance,
    "startInstance"
);
instance_procedure!(StopInstance, "stopInstance");
instance_procedure!(
    /// Deletes an instance and its index.
    RemoveInstance,
    "removeInstance"
);

/// Checks the void result of an instance operation for `HawkInstanceNotFound`.
fn instance_not_found(mut result: Struct, name: &str) -> Result<(), RpcError> {
    if result
        .take::<HawkInstanceNotFound>(INSTANCE_NOT_FOUND_FIELD)?
        .is_some()
    {
        return Err(RemoteError::declared(
            "HawkInstanceNotFound",
            format!("Instance '{name}' not found"),
        )
        .into());
    }
    Ok(())
}

/// Typed client for the Hawk service.
///
/// Borrows an open transport for as long as it lives:
///
/// ```rust,no_run
/// use hawkc_core::client::HawkClient;
/// use hawkc_core::transport::{Endpoint, TcpTransport, Transport};
///
/// # fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let mut transport = TcpTransport::new(Endpoint::new("localhost", 8080));
/// let mut session = transport.open_scoped()?;
/// let backends = HawkClient::new(&mut *session).list_backends()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct HawkClient<'t, T: Transport> {
    service: ServiceClient<'t, T>,
}

impl<'t, T: Transport> HawkClient<'t, T> {
    pub fn new(transport: &'t mut T) -> Self {
        Self::from_service(ServiceClient::new(transport))
    }

    pub fn from_service(service: ServiceClient<'t, T>) -> Self {
        Self { service }
    }

    pub fn with_limits(self, limits: DecodeLimits) -> Self {
        Self::from_service(self.service.with_limits(limits))
    }

    pub fn list_instances(&mut self) -> Result<Vec<Instance>, CallError> {
        self.service.invoke(&ListInstances)
    }

    pub fn list_backends(&mut self) -> Result<Vec<String>, CallError> {
        self.service.invoke(&ListBackends)
    }

    pub fn list_plugins(&mut self) -> Result<Vec<String>, CallError> {
        self.service.invoke(&ListPlugins)
    }

    pub fn start_instance(&mut self, name: &str) -> Result<(), CallError> {
        self.service.invoke(&StartInstance::new(name))
    }

    pub fn stop_instance(&mut self, name: &str) -> Result<(), CallError> {
        self.service.invoke(&StopInstance::new(name))
    }

    pub fn remove_instance(&mut self, name: &str) -> Result<(), CallError> {
        self.service.invoke(&RemoveInstance::new(name))
    }
}
