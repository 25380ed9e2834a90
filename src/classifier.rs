use crate::labels::{display_name, LabelSet};
use crate::preprocess::ImageTensor;

#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    #[error("failed to load model: {0}")]
    Load(String),

    #[error("inference failed: {0}")]
    Inference(String),

    #[error("invalid label set: {0}")]
    Labels(String),

    #[error("model produces {outputs} scores but {labels} labels are configured")]
    LabelMismatch { outputs: usize, labels: usize },

    #[error("model returned an empty score vector")]
    EmptyOutput,
}

/// A loaded network that scores one preprocessed image per call.
pub trait Classifier: Send + Sync {
    fn scores(&self, input: &ImageTensor) -> Result<Vec<f32>, ClassifierError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub index: usize,
    pub label: String,
    pub display_name: String,
}

/// A model and the label set it was trained against.
pub struct DishClassifier {
    model: Box<dyn Classifier>,
    labels: LabelSet,
}

impl DishClassifier {
    /// Pairs `model` with `labels` after a pass over a blank image confirms the output width matches.
    pub fn new(model: Box<dyn Classifier>, labels: LabelSet) -> Result<Self, ClassifierError> {
        let outputs = model.scores(&ImageTensor::zeros())?.len();
        if outputs != labels.len() {
            return Err(ClassifierError::LabelMismatch {
                outputs,
                labels: labels.len(),
            });
        }

        Ok(Self { model, labels })
    }

    pub fn classify(&self, input: &ImageTensor) -> Result<Classification, ClassifierError> {
        let scores = self.model.scores(input)?;
        let index = argmax(&scores).ok_or(ClassifierError::EmptyOutput)?;
        let label = self
            .labels
            .get(index)
            .ok_or(ClassifierError::LabelMismatch {
                outputs: scores.len(),
                labels: self.labels.len(),
            })?
            .to_string();

        Ok(Classification {
            index,
            display_name: display_name(&label),
            label,
        })
    }
}

/// Index of the highest score; the first one wins on ties and NaN never wins.
pub fn argmax(scores: &[f32]) -> Option<usize> {
    if scores.is_empty() {
        return None;
    }

    let mut best = 0;
    let mut top = f32::NEG_INFINITY;
    for (i, &score) in scores.iter().enumerate() {
        if score > top {
            best = i;
            top = score;
        }
    }

    Some(best)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Returns the same scores for every input.
    pub(crate) struct FixedScores(pub Vec<f32>);

    impl Classifier for FixedScores {
        fn scores(&self, _input: &ImageTensor) -> Result<Vec<f32>, ClassifierError> {
            Ok(self.0.clone())
        }
    }

    pub(crate) fn peaked_at(index: usize, len: usize) -> FixedScores {
        let mut scores = vec![0.01; len];
        scores[index] = 0.9;
        FixedScores(scores)
    }

    #[test]
    fn argmax_prefers_first_of_equal_scores() {
        assert_eq!(argmax(&[0.1, 0.4, 0.4, 0.1]), Some(1));
        assert_eq!(argmax(&[0.7]), Some(0));
        assert_eq!(argmax(&[]), None);
    }

    #[test]
    fn argmax_skips_nan() {
        assert_eq!(argmax(&[f32::NAN, 0.2, 0.1]), Some(1));
        assert_eq!(argmax(&[0.2, f32::NAN, 0.3]), Some(2));
        assert_eq!(argmax(&[f32::NAN, f32::NAN]), Some(0));
    }

    #[test]
    fn classify_maps_top_score_to_display_name() {
        let classifier =
            DishClassifier::new(Box::new(peaked_at(10, 13)), LabelSet::builtin()).unwrap();

        let result = classifier.classify(&ImageTensor::zeros()).unwrap();
        assert_eq!(result.index, 10);
        assert_eq!(result.label, "Rendang");
        assert_eq!(result.display_name, "Rendang");
    }

    #[test]
    fn low_confidence_still_returns_top_class() {
        let mut scores = vec![0.076; 13];
        scores[4] = 0.08;
        let classifier =
            DishClassifier::new(Box::new(FixedScores(scores)), LabelSet::builtin()).unwrap();

        assert_eq!(
            classifier.classify(&ImageTensor::zeros()).unwrap().label,
            "Ikan Goreng"
        );
    }

    #[test]
    fn classification_is_deterministic() {
        let classifier =
            DishClassifier::new(Box::new(peaked_at(3, 13)), LabelSet::builtin()).unwrap();
        let input = ImageTensor::zeros();

        assert_eq!(
            classifier.classify(&input).unwrap(),
            classifier.classify(&input).unwrap()
        );
    }

    #[test]
    fn output_width_must_match_label_count() {
        let result = DishClassifier::new(Box::new(peaked_at(0, 10)), LabelSet::builtin());
        assert!(matches!(
            result,
            Err(ClassifierError::LabelMismatch {
                outputs: 10,
                labels: 13
            })
        ));
    }
}
