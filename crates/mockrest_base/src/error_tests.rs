/* 📖 # Why use a separate file for these error tests?

The span trace test depends on the tracing subscriber and on source locations.
Keeping the tests out of error.rs keeps the main module short and the trace
assertions away from code that changes often.
*/

#[cfg(test)]
mod tests {
    use crate::error::ErrorKind;
    use crate::{MockrestError, MockrestResult, ResultExt};
    use expect_test::expect;
    use std::error::Error;
    use std::io;
    use std::path::PathBuf;
    use tracing::span;
    use tracing_error::ErrorLayer;
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    // 📖 # Why set up a subscriber in the test?
    // SpanTrace::capture() requires an active subscriber with ErrorLayer.
    // `try_init()` tolerates other tests having installed it already.
    fn setup_tracing_subscriber() {
        let _ = tracing_subscriber::registry()
            .with(ErrorLayer::default())
            .try_init();
    }

    #[test]
    fn test_error_from_file_error() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let path = PathBuf::from("db.json");
        let error = MockrestError::new(ErrorKind::FileError {
            path: path.clone(),
            source: io_err,
        });

        match error.kind() {
            ErrorKind::FileError { path: p, .. } => assert_eq!(p, &path),
            _ => panic!("Expected FileError variant"),
        }
        assert!(error.source().is_some());
        assert_eq!(error.root_cause().to_string(), "file not found");
    }

    #[test]
    fn test_unsupported_entry_names_key_and_type() {
        let error = MockrestError::new(ErrorKind::UnsupportedEntry {
            key: "count".to_string(),
            actual_type: "number".to_string(),
        });
        assert!(error.is_configuration_fault());
        assert_eq!(
            error.to_string(),
            "Type of \"count\" (number) is not supported. Use objects or arrays of objects."
        );
    }

    #[test]
    fn test_template_faults_are_configuration_faults() {
        let no_route = MockrestError::new(ErrorKind::NoTemplateRoute {
            method: "PATCH".to_string(),
            path: "/posts/1".to_string(),
        });
        let unmapped = MockrestError::new(ErrorKind::UnmappedTemplate {
            resource: "posts".to_string(),
            template_key: "GET-ALL".to_string(),
        });
        assert!(no_route.is_configuration_fault());
        assert!(unmapped.is_configuration_fault());
        assert!(!MockrestError::message("boom").is_configuration_fault());
    }

    #[test]
    fn test_json_error_conversion() {
        fn parse() -> MockrestResult<serde_json::Value> {
            Ok(serde_json::from_str("{not json")?)
        }
        let error = parse().unwrap_err();
        assert!(matches!(error.kind(), ErrorKind::Json { .. }));
        assert!(error.to_string().starts_with("Invalid JSON"));
    }

    #[test]
    fn test_error_display_with_multiple_contexts() {
        let error = MockrestError::message("root error")
            .context("first")
            .context("second");
        assert_eq!(error.to_string(), "first: second: root error");
    }

    #[test]
    fn test_result_ext_chaining() {
        let result: MockrestResult<i32> = Err(crate::err!("root"));
        let err = result
            .context("step 1")
            .with_context(|| "step 2".to_string())
            .unwrap_err();
        assert_eq!(err.get_context(), ["step 1", "step 2"]);
        assert_eq!(err.to_string(), "step 1: step 2: root");
    }

    #[test]
    fn test_result_ext_success_untouched() {
        let result: MockrestResult<i32> = Ok(42);
        assert_eq!(result.context("unused").unwrap(), 42);
    }

    #[test]
    fn test_bail_macro() {
        fn fails(value: i32) -> MockrestResult<()> {
            if value > 1 {
                crate::bail!("value {} too large", value);
            }
            Ok(())
        }
        assert!(fails(1).is_ok());
        assert_eq!(fails(2).unwrap_err().to_string(), "value 2 too large");
    }

    #[test]
    fn test_debug_tree_without_span() {
        let error = MockrestError::message("something went wrong")
            .context("while writing db.json")
            .context("in DELETE /posts/1");

        expect![[r#"
            something went wrong
            ├─ while writing db.json
            └─ in DELETE /posts/1

        "#]]
        .assert_debug_eq(&error);
    }

    #[test]
    fn test_debug_nested_errors() {
        let inner = MockrestError::message("inner error").context("inner context");
        let outer = MockrestError::message("outer error")
            .context("outer context")
            .caused_by(inner);

        expect![[r#"
            outer error
            ├─ outer context
            └─ cause: inner error
               └─ inner context

        "#]]
        .assert_debug_eq(&outer);
        assert_eq!(outer.root_cause().to_string(), "inner context: inner error");
    }

    #[test]
    fn test_spantrace_is_part_of_debug_output() {
        setup_tracing_subscriber();

        let request_span = span!(tracing::Level::INFO, "render_request", path = "/posts");
        let _guard = request_span.enter();

        let error = MockrestError::message("template failed");
        let debug = format!("{:?}", error);

        assert!(debug.starts_with("template failed\n"));
        assert!(debug.contains("Trace:"));
        assert!(debug.contains("render_request"));
    }
}
