use std::path::Path;
use std::sync::Mutex;

use tensorflow::{Graph, ImportGraphDefOptions, Session, SessionOptions, SessionRunArgs, Tensor};

use crate::classifier::{Classifier, ClassifierError};
use crate::preprocess::ImageTensor;

impl From<tensorflow::Status> for ClassifierError {
    fn from(status: tensorflow::Status) -> Self {
        ClassifierError::Inference(status.to_string())
    }
}

struct Loaded {
    session: Session,
    graph: Graph,
}

/// Frozen TensorFlow graph fed through a named input op.
pub struct TensorflowModel {
    loaded: Mutex<Loaded>,
    input_op: String,
    output_op: String,
}

impl TensorflowModel {
    pub fn load(
        model_path: &Path,
        input_op: &str,
        output_op: &str,
    ) -> Result<Self, ClassifierError> {
        let model_bytes = std::fs::read(model_path).map_err(|e| {
            ClassifierError::Load(format!("cannot read {}: {}", model_path.display(), e))
        })?;

        let mut graph = Graph::new();
        graph
            .import_graph_def(&model_bytes, &ImportGraphDefOptions::new())
            .map_err(|e| ClassifierError::Load(e.to_string()))?;

        for op in [input_op, output_op] {
            let found = graph
                .operation_by_name(op)
                .map_err(|e| ClassifierError::Load(e.to_string()))?;
            if found.is_none() {
                return Err(ClassifierError::Load(format!(
                    "operation '{}' not found in graph",
                    op
                )));
            }
        }

        let session = Session::new(&SessionOptions::new(), &graph)
            .map_err(|e| ClassifierError::Load(e.to_string()))?;

        Ok(TensorflowModel {
            loaded: Mutex::new(Loaded { session, graph }),
            input_op: input_op.to_string(),
            output_op: output_op.to_string(),
        })
    }
}

impl Classifier for TensorflowModel {
    fn scores(&self, input: &ImageTensor) -> Result<Vec<f32>, ClassifierError> {
        let loaded = self
            .loaded
            .lock()
            .map_err(|_| ClassifierError::Inference("model lock poisoned".to_string()))?;

        let input_tensor = Tensor::new(&ImageTensor::SHAPE).with_values(input.as_slice())?;

        let input_operation = loaded
            .graph
            .operation_by_name(&self.input_op)?
            .ok_or_else(|| ClassifierError::Inference(format!("missing op '{}'", self.input_op)))?;
        let output_operation = loaded
            .graph
            .operation_by_name(&self.output_op)?
            .ok_or_else(|| {
                ClassifierError::Inference(format!("missing op '{}'", self.output_op))
            })?;

        let mut args = SessionRunArgs::new();
        args.add_feed(&input_operation, 0, &input_tensor);
        let output_token = args.request_fetch(&output_operation, 0);
        loaded.session.run(&mut args)?;

        let output_tensor: Tensor<f32> = args.fetch(output_token)?;
        Ok(output_tensor.to_vec())
    }
}
