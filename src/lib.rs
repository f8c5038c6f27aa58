pub mod cache;
pub mod config;
pub mod exception;
pub mod extension;
pub mod gate;
pub mod handler;
pub mod param;
pub mod postprocess;
pub mod request;
pub mod response;
pub mod route;
pub mod router;
pub mod server;
pub mod session;
pub mod source;

pub use config::{Config, CsrfMode};
pub use exception::{Exception, StartupError};
pub use handler::{ErrorRedirect, Policy, RouteHandler};
pub use param::HttpVerb;
pub use request::{Params, Request};
pub use response::{HttpResponse, Response};
pub use route::RouteTable;
pub use router::Router;
pub use server::Server;
pub use session::{Session, SessionStore};
pub use source::{ContentSource, FsSource};
