use crate::{Context, Result};
use std::fmt::Debug;
use std::time::Duration;

/// SigningCredential is implemented by credential types used for signing.
pub trait SigningCredential: Clone + Debug + Send + Sync + Unpin + 'static {
    /// Check if the credential is still usable for signing.
    fn is_valid(&self) -> bool;
}

impl<T: SigningCredential> SigningCredential for Option<T> {
    fn is_valid(&self) -> bool {
        let Some(cred) = self else {
            return false;
        };

        cred.is_valid()
    }
}

/// ProvideCredential is the trait used by the signer to load credentials.
///
/// Services may require different credentials to sign requests; AWS needs
/// an access key id and secret access key, optionally a session token.
#[async_trait::async_trait]
pub trait ProvideCredential: Debug + Send + Sync + Unpin + 'static {
    /// Credential returned by this provider.
    type Credential: Send + Sync + Unpin + 'static;

    /// Provide a credential from the current context.
    ///
    /// Returning `Ok(None)` means no credential is available; the signer
    /// treats the request as anonymous.
    async fn provide_credential(&self, ctx: &Context) -> Result<Option<Self::Credential>>;
}

/// SignRequest is the trait used by the signer to sign a request in place.
#[async_trait::async_trait]
pub trait SignRequest: Debug + Send + Sync + Unpin + 'static {
    /// Credential used by this request signer.
    type Credential: Send + Sync + Unpin + 'static;

    /// Sign the request parts in place.
    ///
    /// ## Expires In
    ///
    /// `expires_in` selects presigning: when set, the signature is carried
    /// in the query string and stays valid for the given duration instead
    /// of being written into an `Authorization` header.
    async fn sign_request(
        &self,
        ctx: &Context,
        req: &mut http::request::Parts,
        credential: Option<&Self::Credential>,
        expires_in: Option<Duration>,
    ) -> Result<()>;
}
