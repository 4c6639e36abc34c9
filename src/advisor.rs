//! Declarative advisors
//!
//! Reference [`ArtifactFactory`] that reads advice declarations from a
//! provider's method annotations:
//!
//! ```text
//! [[methods]]
//! name = "getPoint"
//! annotations = { pointcut = "execution(* demo..say())" }
//!
//! [[methods]]
//! name = "doBefore"
//! annotations = { before = "getPoint()", order = "1" }
//! ```
//!
//! Each advice method becomes one [`Advisor`] bound to a provider instance
//! obtained from the instance source. Named pointcut references are
//! resolved against the provider's own `pointcut` methods.

use std::fmt;
use std::sync::Arc;

use crate::artifact::ArtifactFactory;
use crate::error::BoxError;
use crate::instance::ProviderInstanceFactory;
use crate::registry::{InstanceHandle, MethodDescriptor, TypeDescriptor};

const POINTCUT_ANNOTATION: &str = "pointcut";
const ORDER_ANNOTATION: &str = "order";

/// Kind of advice, in application order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AdviceKind {
    Around,
    Before,
    After,
    AfterReturning,
    AfterThrowing,
}

impl AdviceKind {
    pub const ALL: [AdviceKind; 5] = [
        AdviceKind::Around,
        AdviceKind::Before,
        AdviceKind::After,
        AdviceKind::AfterReturning,
        AdviceKind::AfterThrowing,
    ];

    pub fn annotation(self) -> &'static str {
        match self {
            AdviceKind::Around => "around",
            AdviceKind::Before => "before",
            AdviceKind::After => "after",
            AdviceKind::AfterReturning => "after_returning",
            AdviceKind::AfterThrowing => "after_throwing",
        }
    }
}

impl fmt::Display for AdviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.annotation())
    }
}

/// One advice method bound to a pointcut and a provider instance
pub struct Advisor {
    pub provider: String,
    pub method: String,
    pub kind: AdviceKind,
    pub pointcut: String,
    pub order: i32,
    pub instance: InstanceHandle,
}

impl fmt::Debug for Advisor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Advisor")
            .field("provider", &self.provider)
            .field("method", &self.method)
            .field("kind", &self.kind)
            .field("pointcut", &self.pointcut)
            .field("order", &self.order)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Advisor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{} [{}] {} (order {})",
            self.provider, self.method, self.kind, self.pointcut, self.order
        )
    }
}

/// Malformed advice declaration
#[derive(Debug, thiserror::Error)]
pub enum AdviceError {
    #[error("Advice method '{provider}.{method}' declares an empty pointcut")]
    EmptyPointcut { provider: String, method: String },

    #[error("Advice method '{provider}.{method}' has non-integer order '{value}'")]
    InvalidOrder {
        provider: String,
        method: String,
        value: String,
    },

    #[error("Advice method '{provider}.{method}' references unknown pointcut '{reference}'")]
    UnknownPointcut {
        provider: String,
        method: String,
        reference: String,
    },
}

/// Builds [`Advisor`]s from method annotations
#[derive(Debug, Clone, Copy, Default)]
pub struct DeclarativeAdvisorFactory;

impl DeclarativeAdvisorFactory {
    pub fn new() -> Self {
        Self
    }

    fn advice_methods<'a>(descriptor: &'a TypeDescriptor) -> Vec<(AdviceKind, &'a MethodDescriptor, &'a str)> {
        let mut methods: Vec<_> = descriptor
            .methods
            .iter()
            .filter_map(|method| {
                AdviceKind::ALL
                    .iter()
                    .find_map(|kind| method.annotation(kind.annotation()).map(|expr| (*kind, method, expr)))
            })
            .collect();
        methods.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.name.cmp(&b.1.name)));
        methods
    }

    fn resolve_pointcut(
        descriptor: &TypeDescriptor,
        provider: &str,
        method: &str,
        expression: &str,
    ) -> Result<String, AdviceError> {
        let trimmed = strip_parens(expression.trim());
        if trimmed.is_empty() {
            return Err(AdviceError::EmptyPointcut {
                provider: provider.to_string(),
                method: method.to_string(),
            });
        }

        let Some(reference) = named_reference(trimmed) else {
            return Ok(trimmed.to_string());
        };
        descriptor
            .methods
            .iter()
            .find(|m| m.name == reference)
            .and_then(|m| m.annotation(POINTCUT_ANNOTATION))
            .map(|expr| strip_parens(expr.trim()).to_string())
            .ok_or_else(|| AdviceError::UnknownPointcut {
                provider: provider.to_string(),
                method: method.to_string(),
                reference: reference.to_string(),
            })
    }
}

impl ArtifactFactory for DeclarativeAdvisorFactory {
    type Artifact = Advisor;

    fn build_artifacts(&self, source: &ProviderInstanceFactory) -> Result<Vec<Arc<Advisor>>, BoxError> {
        let metadata = source.metadata();
        let methods = Self::advice_methods(&metadata.descriptor);
        if methods.is_empty() {
            tracing::debug!(provider = %metadata.name, "Provider declares no advice methods");
            return Ok(Vec::new());
        }

        let instance = source.supply()?;
        let mut advisors = Vec::with_capacity(methods.len());
        for (kind, method, expression) in methods {
            let pointcut = Self::resolve_pointcut(&metadata.descriptor, &metadata.name, &method.name, expression)?;
            let order = match method.annotation(ORDER_ANNOTATION) {
                Some(value) => value.trim().parse().map_err(|_| AdviceError::InvalidOrder {
                    provider: metadata.name.clone(),
                    method: method.name.clone(),
                    value: value.to_string(),
                })?,
                None => source.order(),
            };
            advisors.push(Arc::new(Advisor {
                provider: metadata.name.clone(),
                method: method.name.clone(),
                kind,
                pointcut,
                order,
                instance: Arc::clone(&instance),
            }));
        }

        tracing::trace!(provider = %metadata.name, advisors = advisors.len(), "Built advisors");
        Ok(advisors)
    }
}

fn strip_parens(mut expression: &str) -> &str {
    while let Some(inner) = expression.strip_prefix('(').and_then(|e| e.strip_suffix(')')) {
        // "(a) && (b)" must stay intact
        if !balanced(inner) {
            break;
        }
        expression = inner.trim();
    }
    expression
}

fn balanced(expression: &str) -> bool {
    let mut depth = 0usize;
    for c in expression.chars() {
        match c {
            '(' => depth += 1,
            ')' => match depth.checked_sub(1) {
                Some(d) => depth = d,
                None => return false,
            },
            _ => {}
        }
    }
    depth == 0
}

/// `getPoint()` -> `getPoint`, `demo.TestAspect.getPoint()` -> `getPoint`
fn named_reference(expression: &str) -> Option<&str> {
    let path = expression.strip_suffix("()")?;
    let is_identifier = |segment: &str| !segment.is_empty() && segment.chars().all(|c| c.is_alphanumeric() || c == '_');
    if !path.split('.').all(is_identifier) {
        return None;
    }
    path.rsplit('.').next()
}
