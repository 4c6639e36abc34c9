//! Artifact factory seam

use std::marker::PhantomData;
use std::sync::Arc;

use crate::error::BoxError;
use crate::instance::ProviderInstanceFactory;

/// Turns a provider's instance source into interception artifacts
///
/// Implementations may call [`ProviderInstanceFactory::supply`] but must not
/// keep state the resolution cache could observe. An empty list is valid.
pub trait ArtifactFactory: Send + Sync {
    type Artifact: Send + Sync + 'static;

    fn build_artifacts(&self, source: &ProviderInstanceFactory) -> Result<Vec<Arc<Self::Artifact>>, BoxError>;
}

impl<T: ArtifactFactory + ?Sized> ArtifactFactory for Arc<T> {
    type Artifact = T::Artifact;

    fn build_artifacts(&self, source: &ProviderInstanceFactory) -> Result<Vec<Arc<Self::Artifact>>, BoxError> {
        (**self).build_artifacts(source)
    }
}

/// Closure-backed artifact factory
pub struct FnArtifactFactory<F, A> {
    build_fn: F,
    _phantom: PhantomData<fn() -> A>,
}

impl<F, A> FnArtifactFactory<F, A> {
    pub fn new(build_fn: F) -> Self {
        Self {
            build_fn,
            _phantom: PhantomData,
        }
    }
}

impl<F, A> ArtifactFactory for FnArtifactFactory<F, A>
where
    F: Fn(&ProviderInstanceFactory) -> Result<Vec<Arc<A>>, BoxError> + Send + Sync,
    A: Send + Sync + 'static,
{
    type Artifact = A;

    fn build_artifacts(&self, source: &ProviderInstanceFactory) -> Result<Vec<Arc<A>>, BoxError> {
        (self.build_fn)(source)
    }
}
