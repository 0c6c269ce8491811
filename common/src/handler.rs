//! [`Handler`] abstractions.

use std::future::Future;

/// Executable handler.
///
/// The same abstraction backs every layer of the service: commands and
/// queries are [`Handler`]s of a service, while database and key-value
/// operations are [`Handler`]s of the corresponding infrastructure client.
/// The `Args` type parameter selects the operation, so a single client may
/// implement many of them.
pub trait Handler<Args = ()> {
    /// Type of successful [`Handler`] result.
    type Ok;

    /// Type of this [`Handler`] error.
    type Err;

    /// Executes this [`Handler`] with the provided arguments.
    fn execute(
        &self,
        args: Args,
    ) -> impl Future<Output = Result<Self::Ok, Self::Err>>;
}
