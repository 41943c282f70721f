use arrow_schema::SchemaRef;
use error_stack::{IntoReport, ResultExt};
use sluice_batch::Batch;

use crate::transform::{Error, Transform};

/// Transform for projection.
///
/// Narrows and/or reorders the input columns by name. Row-preserving.
pub(crate) struct Project {
    indices: Vec<usize>,
    schema: SchemaRef,
}

impl Project {
    pub fn try_new(
        input_schema: &SchemaRef,
        columns: &[String],
        schema: SchemaRef,
    ) -> error_stack::Result<Self, Error> {
        let indices = columns
            .iter()
            .map(|name| {
                input_schema
                    .index_of(name)
                    .into_report()
                    .change_context_lazy(|| Error::CreateTransform("project"))
            })
            .collect::<error_stack::Result<Vec<_>, Error>>()?;
        Ok(Self { indices, schema })
    }
}

impl Transform for Project {
    fn apply(&self, batch: Batch) -> error_stack::Result<Batch, Error> {
        debug_assert!(!batch.is_empty());
        batch
            .project(&self.indices, self.schema.clone())
            .change_context_lazy(|| Error::ExecuteTransform("project"))
    }

    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sluice_testing::{int64_batch, int64_schema};

    #[test]
    fn test_project_narrows_and_reorders() {
        let input = Batch::new(int64_batch(&[
            ("a", vec![1, 2]),
            ("b", vec![3, 4]),
            ("c", vec![5, 6]),
        ]));
        let schema = int64_schema(&["c", "a"]);
        let project =
            Project::try_new(&input.schema(), &["c".to_owned(), "a".to_owned()], schema).unwrap();

        let output = project.apply(input).unwrap();
        assert_eq!(output.num_rows(), 2);
        assert_eq!(output.schema().field(0).name(), "c");
        assert_eq!(output.schema().field(1).name(), "a");
    }

    #[test]
    fn test_project_unknown_column() {
        let input = Batch::new(int64_batch(&[("a", vec![1])]));
        let schema = int64_schema(&["nope"]);
        let result = Project::try_new(&input.schema(), &["nope".to_owned()], schema);
        assert!(result.is_err());
    }
}
