#[cfg(test)]
mod tests {
    use crate::core::connections::PortValidator;
    use crate::core::error::EngineError;
    use crate::core::tests::fixtures::heater;
    use crate::core::types::PortRef;

    #[test]
    fn test_port_validator_accepts_matching_direction() {
        let element = heater("H", 1.0);

        let out = PortValidator::validate_source_port(&element, &PortRef::from("Out"));
        assert!(out.is_ok(), "Valid source port should be accepted");
        assert_eq!(element.out_ports().id_of_name("Out"), out.ok());

        let inp = PortValidator::validate_target_port(&element, &PortRef::from("In"));
        assert!(inp.is_ok(), "Valid target port should be accepted");

        // Identifiers resolve the same way as names
        let id = element.in_ports().id_of_name("In").unwrap();
        assert_eq!(PortValidator::validate_target_port(&element, &PortRef::Id(id)).unwrap(), id);
    }

    #[test]
    fn test_port_validator_rejects_wrong_direction() {
        let element = heater("H", 1.0);

        let err = PortValidator::validate_source_port(&element, &PortRef::from("In")).unwrap_err();
        match err {
            EngineError::DirectionMismatch {
                element,
                expected,
                actual,
                ..
            } => {
                assert_eq!(element, "H");
                assert_eq!(expected, "output");
                assert_eq!(actual, "input");
            }
            other => panic!("unexpected error: {other}"),
        }

        let err = PortValidator::validate_target_port(&element, &PortRef::from("Out")).unwrap_err();
        assert!(matches!(err, EngineError::DirectionMismatch { .. }));
    }

    #[test]
    fn test_port_validator_rejects_unknown_port() {
        let element = heater("H", 1.0);
        let err = PortValidator::validate_source_port(&element, &PortRef::from("Missing")).unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
        assert!(err.to_string().contains("Out"), "Error should list the valid ports");
    }
}
