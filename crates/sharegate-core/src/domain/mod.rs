//! Domain model (ids, grant, state, artifact, recipient, errors).

pub mod artifact;
pub mod errors;
pub mod grant;
pub mod ids;
pub mod recipient;
pub mod state;

pub use self::artifact::{ArtifactSource, export_file_name};
pub use self::errors::{
    ArtifactError, BrokerError, ErrorKind, NotifyError, StoreError, ValidationError,
};
pub use self::grant::Grant;
pub use self::ids::{AccessToken, ArtifactRef};
pub use self::recipient::Recipient;
pub use self::state::GrantState;
