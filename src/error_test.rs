#[cfg(test)]
mod tests {
    use crate::error::*;
    use http::StatusCode;
    use kube::core::ErrorResponse;

    fn api_error(code: u16, reason: &str, message: &str) -> kube::Error {
        kube::Error::Api(ErrorResponse {
            status: "Failure".to_string(),
            message: message.to_string(),
            reason: reason.to_string(),
            code,
        })
    }

    fn classify(code: u16, reason: &str) -> Error {
        Error::from_kube(api_error(code, reason, "boom"), "Engine", "ns", "e1")
    }

    #[test]
    fn test_not_found_is_structured() {
        match classify(404, "NotFound") {
            Error::NotFound {
                kind,
                name,
                namespace,
            } => {
                assert_eq!(kind, "Engine");
                assert_eq!(name, "e1");
                assert_eq!(namespace, "ns");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_conflict_reasons() {
        assert!(classify(409, "AlreadyExists").is_already_exists());
        assert!(classify(409, "Conflict").is_conflict());
        assert!(!classify(409, "Conflict").is_already_exists());
    }

    #[test]
    fn test_status_codes() {
        assert!(classify(400, "BadRequest").is_invalid());
        assert!(classify(422, "Invalid").is_invalid());
        assert!(classify(401, "Unauthorized").is_forbidden());
        assert!(classify(403, "Forbidden").is_forbidden());
        assert!(classify(503, "ServiceUnavailable").is_connection());
        assert!(classify(504, "Timeout").is_connection());
        assert!(matches!(
            classify(500, "InternalError"),
            Error::Internal(msg) if msg.contains("500") && msg.contains("boom")
        ));
    }

    #[test]
    fn test_serde_errors_are_serialization() {
        let serde_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = Error::from_kube(kube::Error::SerdeError(serde_err), "Engine", "ns", "e1");
        assert!(matches!(err, Error::Serialization(_)));
    }

    #[test]
    fn test_request_build_errors_are_invalid() {
        let err: Error = kube::core::request::Error::Validation("bad".to_string()).into();
        assert!(err.is_invalid());
    }

    #[test]
    fn test_status_round_trips_through_classification() {
        let errors = [
            Error::NotFound {
                kind: "Engine".into(),
                name: "e1".into(),
                namespace: "ns".into(),
            },
            Error::AlreadyExists {
                kind: "Engine".into(),
                name: "e1".into(),
                namespace: "ns".into(),
            },
            Error::Conflict("stale".into()),
            Error::Invalid("bad".into()),
            Error::Forbidden("denied".into()),
            Error::Connection("down".into()),
        ];

        for err in errors {
            let (code, reason) = err.status();
            let back = Error::from_kube(
                api_error(code.as_u16(), reason, &err.to_string()),
                "Engine",
                "ns",
                "e1",
            );
            assert_eq!(
                std::mem::discriminant(&back),
                std::mem::discriminant(&err),
                "{} -> {} -> {}",
                err,
                code,
                back
            );
        }
    }

    #[test]
    fn test_metadata_errors_report_invalid() {
        let (code, reason) = Error::MetadataError("x".into()).status();
        assert_eq!(code, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(reason, "Invalid");
    }

    #[test]
    fn test_display() {
        let err = Error::NotFound {
            kind: "Engine".into(),
            name: "e1".into(),
            namespace: "ns".into(),
        };
        assert_eq!(err.to_string(), "Resource not found: Engine e1 in namespace ns");
    }
}
