//! Gender verification
//!
//! The classifier itself is external; this module wraps it with an
//! explicit failure policy and the single normalization step from raw
//! labels to queue vocabulary.

use crate::config::ClassifierFallback;
use crate::error::{ChatError, Result};
use crate::types::Gender;
use async_trait::async_trait;
use tracing::{info, warn};

/// External classifier producing a raw gender label from captured
/// verification input.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GenderClassifier: Send + Sync {
    async fn classify(&self, device_id: &str, image_data: &[u8]) -> Result<String>;
}

pub struct VerificationService {
    classifier: Box<dyn GenderClassifier>,
    fallback: ClassifierFallback,
}

impl VerificationService {
    pub fn new(classifier: Box<dyn GenderClassifier>, fallback: ClassifierFallback) -> Self {
        Self {
            classifier,
            fallback,
        }
    }

    /// Run classification and normalize the label.
    ///
    /// Classifier failures follow the configured fallback: deny outright
    /// or assign a uniformly random concrete gender. The random path is
    /// logged loudly because it fabricates data.
    pub async fn verify(&self, device_id: &str, image_data: &[u8]) -> Result<Gender> {
        match self.classifier.classify(device_id, image_data).await {
            Ok(label) => match Gender::from_label(&label) {
                Some(gender) => {
                    info!(
                        "Verified {} as {}",
                        crate::utils::short_id(device_id),
                        gender
                    );
                    Ok(gender)
                }
                None => Err(ChatError::VerificationFailed {
                    message: format!("Unrecognized classifier label: {}", label),
                }
                .into()),
            },
            Err(err) => match self.fallback {
                ClassifierFallback::Deny => Err(ChatError::VerificationFailed {
                    message: format!("Classifier unavailable: {}", err),
                }
                .into()),
                ClassifierFallback::RandomLabel => {
                    let gender = if rand::random::<bool>() {
                        Gender::Male
                    } else {
                        Gender::Female
                    };
                    warn!(
                        "Classifier failed for {}; assigning random gender {}: {}",
                        crate::utils::short_id(device_id),
                        gender,
                        err
                    );
                    Ok(gender)
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[tokio::test]
    async fn test_verify_normalizes_label() {
        let mut classifier = MockGenderClassifier::new();
        classifier
            .expect_classify()
            .returning(|_, _| Ok("Woman".to_string()));

        let service = VerificationService::new(Box::new(classifier), ClassifierFallback::Deny);
        let gender = service.verify("dev-1", b"jpeg").await.unwrap();
        assert_eq!(gender, Gender::Female);
    }

    #[tokio::test]
    async fn test_unrecognized_label_is_rejected() {
        let mut classifier = MockGenderClassifier::new();
        classifier
            .expect_classify()
            .returning(|_, _| Ok("unsure".to_string()));

        let service = VerificationService::new(Box::new(classifier), ClassifierFallback::Deny);
        assert!(service.verify("dev-1", b"jpeg").await.is_err());
    }

    #[tokio::test]
    async fn test_deny_fallback_propagates_failure() {
        let mut classifier = MockGenderClassifier::new();
        classifier
            .expect_classify()
            .returning(|_, _| Err(anyhow!("model offline")));

        let service = VerificationService::new(Box::new(classifier), ClassifierFallback::Deny);
        let err = service.verify("dev-1", b"jpeg").await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ChatError>(),
            Some(ChatError::VerificationFailed { .. })
        ));
    }

    #[tokio::test]
    async fn test_random_fallback_yields_concrete_gender() {
        let mut classifier = MockGenderClassifier::new();
        classifier
            .expect_classify()
            .returning(|_, _| Err(anyhow!("model offline")));

        let service =
            VerificationService::new(Box::new(classifier), ClassifierFallback::RandomLabel);
        // Opt-in fallback must still produce a usable concrete value
        let gender = service.verify("dev-1", b"jpeg").await.unwrap();
        assert!(matches!(gender, Gender::Male | Gender::Female));
    }
}
