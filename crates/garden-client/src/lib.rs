//! # garden-client
//!
//! Client-side plumbing for driving a Garden container server from tests.
//!
//! The pieces stack as follows:
//!
//! ```text
//! Client / Container          handle-oriented facade
//!        │
//! RetryingConnection<C>       forwards everything, wraps `run` processes
//!        │                          │
//! C: Connection               RetryingProcess  (retries `wait` only)
//! ```
//!
//! `wait` is the one operation retried: asking again for an exit status has
//! no side effects, while repeating `signal`, `set_tty` or any container
//! operation could. By default a `wait` call makes up to five attempts and
//! returns the last error if all of them fail.
//!
//! ## Example
//!
//! ```rust,ignore
//! use garden_client::{Client, ContainerFixture, RetryingConnection, run_process};
//! use garden_proto::ProcessSpec;
//!
//! let client = Client::new(RetryingConnection::new(connection));
//! let container = ContainerFixture::new().create(&client).await?;
//! let output = run_process(&container, ProcessSpec::new("echo", ["hi"])).await?;
//! assert_eq!(output.exit_code, 0);
//! ContainerFixture::destroy(&client, &container).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod client;
pub mod config;
pub mod connection;
pub mod fakes;
pub mod fixture;
pub mod retry;
pub mod retrying_connection;
pub mod retrying_process;

pub use client::{Client, Container};
pub use config::SuiteConfig;
pub use connection::{
    BoxFuture, ByteReader, ByteWriter, Connection, Process, ProcessIo, StreamInSpec,
    StreamOutSpec,
};
pub use fixture::{ContainerFixture, ProcessOutput, SharedBuffer, run_for_stdout, run_process};
pub use retry::{DEFAULT_MAX_ATTEMPTS, RetryOn, RetryPolicy};
pub use retrying_connection::RetryingConnection;
pub use retrying_process::{RetryingProcess, UNKNOWN_EXIT_CODE};
