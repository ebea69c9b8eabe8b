// Tests for scheme construction, lookups, removal and export
#[cfg(test)]
mod tests {
    use crate::core::components::{Element, Port};
    use crate::core::error::EngineError;
    use crate::core::execution::{EdgeKind, PortEdge, Scheme, SchemeObject};
    use crate::core::tests::fixtures::*;
    use crate::core::types::{Direction, Handle, PortRef};
    use crate::core::values::{Payload, Value, ValueStatus};

    fn chain() -> Scheme {
        let mut scheme = Scheme::new("chain");
        let s = scheme.add_element(source("S", 2.0, 300.0)).unwrap();
        let h = scheme.add_element(heater("H", 15.0)).unwrap();
        let k = scheme.add_element(sink("K")).unwrap();
        scheme.connect(s, "Out", h, "In").unwrap();
        scheme.connect(h, "Out", k, "In").unwrap();
        scheme
    }

    #[test]
    fn test_add_element_indexes_ports_and_values() {
        let scheme = chain();
        let heater = scheme.element_by_name("H").unwrap();

        for (port_id, direction) in heater.all_port_ids() {
            let (owner, found, _) = scheme.port(port_id).unwrap();
            assert_eq!(owner, scheme.element_id("H").unwrap());
            assert_eq!(found, direction);
        }
        for (value_id, _) in heater.all_value_ids() {
            assert!(scheme.value(value_id).is_some());
        }
        // 2 values per stream port, 1 parameter
        assert_eq!(heater.all_value_ids().len(), 5);
    }

    #[test]
    fn test_internal_group_adds_in_to_out_edges() {
        let scheme = chain();
        let heater = scheme.element_by_name("H").unwrap();
        let inp = heater.in_ports().id_of_name("In").unwrap();
        let out = heater.out_ports().id_of_name("Out").unwrap();

        assert!(scheme.graph().edges().contains(&PortEdge::internal(inp, out)));
        assert!(!scheme.graph().edges().contains(&PortEdge::internal(out, inp)));
        // two external edges plus one internal edge
        assert_eq!(scheme.graph().edge_count(), 3);
        assert_eq!(scheme.graph().external_edges().count(), 2);
    }

    #[test]
    fn test_external_edges_carry_connection_ids() {
        let scheme = chain();
        for edge in scheme.graph().external_edges() {
            let EdgeKind::External(Some(id)) = edge.kind else {
                panic!("external edge without a connection");
            };
            let connection = scheme.connection(id).unwrap();
            assert_eq!(connection.source().port_id(), edge.from);
            assert_eq!(connection.destination().port_id(), edge.to);
        }
    }

    #[test]
    fn test_connection_names_come_from_scheme_counter() {
        let mut scheme = chain();
        let names: Vec<&str> = scheme.connections().base_names();
        assert_eq!(names, vec!["conn1", "conn2"]);
        assert_eq!(scheme.unique_name("conn"), "conn3");

        // A fresh scheme starts its own counter
        let mut other = Scheme::new("other");
        assert_eq!(other.unique_name("conn"), "conn1");
    }

    #[test]
    fn test_connect_rejects_wrong_directions() {
        let mut scheme = chain();
        let s = scheme.element_id("S").unwrap();
        let h = scheme.element_id("H").unwrap();

        let err = scheme.connect(h, "In", s, "Out").unwrap_err();
        assert!(matches!(err, EngineError::DirectionMismatch { .. }));
        let err = scheme.connect_by_names("S", "Out", "Nowhere", "In").unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
    }

    #[test]
    fn test_connect_by_port_ids() {
        let mut scheme = Scheme::new("ids");
        let s = scheme.add_element(source("S", 1.0, 300.0)).unwrap();
        let k = scheme.add_element(sink("K")).unwrap();
        let out = scheme.element(s).unwrap().out_ports().id_of_name("Out").unwrap();
        let inp = scheme.element(k).unwrap().in_ports().id_of_name("In").unwrap();

        let id = scheme.connect(s, PortRef::Id(out), k, PortRef::Id(inp)).unwrap();
        assert_eq!(scheme.connection(id).unwrap().source().port_id(), out);

        let source_handle = scheme.output_port(s, "Out").unwrap();
        let sink_handle = scheme.input_port(k, "In").unwrap();
        assert!(scheme.connect_named("second", source_handle, sink_handle).is_ok());
        assert!(scheme.connect_named("second", source_handle, sink_handle).is_err());
    }

    #[test]
    fn test_duplicate_element_name_rejected() {
        let mut scheme = chain();
        let err = scheme.add_element(sink("K")).unwrap_err();
        assert!(matches!(err, EngineError::DuplicateName { .. }));
    }

    #[test]
    fn test_get_object_by_id_resolves_every_kind() {
        let scheme = chain();
        let h = scheme.element_id("H").unwrap();
        let heater = scheme.element(h).unwrap();
        let port = heater.in_ports().id_of_name("In").unwrap();
        let (value, _) = heater.all_value_ids()[0];
        let connection = scheme.connections().ids()[0];

        assert!(matches!(
            scheme.get_object_by_id(port.uuid()),
            Some(SchemeObject::Port {
                direction: Direction::Input,
                ..
            })
        ));
        assert!(matches!(
            scheme.get_object_by_id(value.uuid()),
            Some(SchemeObject::Value { element, .. }) if element == h
        ));
        assert!(matches!(
            scheme.get_object_by_id(h.uuid()),
            Some(SchemeObject::Element(e)) if e.name() == "H"
        ));
        assert!(matches!(
            scheme.get_object_by_id(connection.uuid()),
            Some(SchemeObject::Connection(_))
        ));
        assert!(scheme.get_object_by_id(uuid::Uuid::new_v4()).is_none());
    }

    #[test]
    fn test_ids_to_objects_skip_unknown() {
        let scheme = chain();
        let ids = scheme.elements().ids();
        let elements = scheme.ids_to_elements(&ids);
        let names: Vec<&str> = elements.iter().map(|e| e.name()).collect();
        assert_eq!(names, vec!["S", "H", "K"]);

        let heater = scheme.element_by_name("H").unwrap();
        let port_ids: Vec<_> = heater.all_port_ids().into_iter().map(|(id, _)| id).collect();
        assert_eq!(scheme.ids_to_ports(&port_ids).len(), 2);

        let value_ids: Vec<_> = heater.all_value_ids().into_iter().map(|(id, _)| id).collect();
        let mut with_unknown = value_ids.clone();
        with_unknown.push(crate::core::types::ValueId::generate());
        assert_eq!(scheme.ids_to_values(&with_unknown).len(), value_ids.len());
    }

    #[test]
    fn test_set_values_through_scheme() {
        let mut scheme = chain();
        scheme.set_param("H", "DT", 20.0, ValueStatus::Fixed).unwrap();
        assert_eq!(number(scheme.element_by_name("H").unwrap(), "DT"), Some(20.0));

        scheme.set_port_value("K", "In", "T", 310.0, ValueStatus::Fixed).unwrap();
        assert_eq!(number(scheme.element_by_name("K").unwrap(), "T_In"), Some(310.0));

        let id = scheme.element_by_name("S").unwrap().parameters().id_of_name("Gset").unwrap();
        scheme.set_value_by_id(id, Some(Payload::Float(9.0)), ValueStatus::Fixed).unwrap();
        assert_eq!(number(scheme.element_by_name("S").unwrap(), "Gset"), Some(9.0));

        assert!(matches!(
            scheme.set_param("H", "Missing", 1.0, ValueStatus::Fixed),
            Err(EngineError::NotFound(_))
        ));
        let err = scheme.set_param("H", "DT", -1.0, ValueStatus::Fixed);
        assert!(err.is_ok(), "DT has no bounds");
    }

    #[test]
    fn test_remove_element_purges_everything() {
        let mut scheme = chain();
        let h = scheme.element_id("H").unwrap();
        let heater = scheme.element(h).unwrap();
        let port_ids: Vec<_> = heater.all_port_ids().into_iter().map(|(id, _)| id).collect();
        let value_ids: Vec<_> = heater.all_value_ids().into_iter().map(|(id, _)| id).collect();

        let removed = scheme.remove_element(h).unwrap();
        assert_eq!(removed.name(), "H");

        assert!(scheme.element(h).is_none());
        assert!(scheme.element_by_name("H").is_none());
        assert!(scheme.connections().is_empty());
        assert_eq!(scheme.graph().edge_count(), 0);
        for id in port_ids {
            assert!(scheme.port(id).is_none());
            assert!(!scheme.graph().contains_node(id));
        }
        for id in value_ids {
            assert!(scheme.value(id).is_none());
        }
        assert!(matches!(scheme.remove_element(h), Err(EngineError::NotFound(_))));

        // The name is free again
        assert!(scheme.add_element(crate::core::tests::fixtures::heater("H", 1.0)).is_ok());
    }

    #[test]
    fn test_remove_connection_drops_its_edge() {
        let mut scheme = chain();
        let id = scheme.connections().ids()[0];
        let removed = scheme.remove_connection(id).unwrap();
        assert_eq!(removed.name(), "conn1");
        assert_eq!(scheme.graph().external_edges().count(), 1);
        assert!(scheme.remove_connection(id).is_none());
    }

    #[test]
    fn test_link_ports_requires_equal_ports() {
        let mut scheme = Scheme::new("links");
        let s = scheme.add_element(source("S", 1.0, 300.0)).unwrap();
        let k = scheme.add_element(sink("K")).unwrap();
        let odd = scheme
            .add_element(
                Element::builder("Odd")
                    .in_port(Port::from_values("In", vec![depend("G", flow())]).unwrap())
                    .build()
                    .unwrap(),
            )
            .unwrap();

        let out = scheme.output_port(s, "Out").unwrap();
        scheme.link_ports(out, scheme.input_port(k, "In").unwrap()).unwrap();
        assert_eq!(scheme.graph().external_edges().count(), 1);
        assert!(scheme.graph().external_edges().all(|edge| edge.connection().is_none()));

        let err = scheme
            .link_ports(out, scheme.input_port(odd, "In").unwrap())
            .unwrap_err();
        assert!(matches!(err, EngineError::TypeMismatch { .. }));
    }

    #[test]
    fn test_link_propagation_pairs_by_name_and_direction() {
        let mut scheme = Scheme::new("links");
        let a = scheme.add_element(heater("A", 1.0)).unwrap();
        let b = scheme.add_element(heater("B", 1.0)).unwrap();
        scheme
            .link_ports(scheme.output_port(a, "Out").unwrap(), scheme.input_port(b, "In").unwrap())
            .unwrap();

        // Backward only: A.Out waits, B.In is authoritative
        scheme
            .update_element(a, |element| {
                element
                    .out_port_mut("Out")
                    .unwrap()
                    .get_value_mut("T")
                    .unwrap()
                    .update(None, Some(ValueStatus::Depend))
            })
            .unwrap()
            .unwrap();
        scheme.set_port_value("B", "In", "T", 350.0, ValueStatus::Fixed).unwrap();

        assert_eq!(scheme.propagate_known_values(false).unwrap(), 0);
        assert_eq!(scheme.propagate_known_values(true).unwrap(), 1);
        assert_eq!(number(scheme.element(a).unwrap(), "T_Out"), Some(350.0));
    }

    #[test]
    fn test_update_element_reindexes_values() {
        let mut scheme = chain();
        let k = scheme.element_id("K").unwrap();
        let new_id = scheme
            .update_element(k, |element| {
                element
                    .in_port_mut("In")
                    .unwrap()
                    .add_value(Value::new("P", crate::core::values::ValueSpec::new("pressure")), None)
            })
            .unwrap()
            .unwrap();
        assert_eq!(scheme.value(new_id).unwrap().name(), "P");
    }

    #[test]
    fn test_describe_lists_elements_and_connections() {
        let scheme = chain();
        let text = scheme.describe();
        assert!(text.starts_with("scheme 'chain': 3 elements, 2 connections"));
        assert!(text.contains("'conn1': S.Out -> H.In"));
        assert!(text.contains("'conn2': H.Out -> K.In"));
        assert_eq!(scheme.to_string(), text);
    }

    #[test]
    fn test_record_round_trip_preserves_ids() {
        init_logging();
        let mut scheme = chain();
        let s = scheme.element_id("S").unwrap();
        let tap = scheme.add_element(sink("Tap")).unwrap();
        scheme
            .link_ports(scheme.output_port(s, "Out").unwrap(), scheme.input_port(tap, "In").unwrap())
            .unwrap();
        scheme.run().unwrap();

        let json = scheme.to_json().unwrap();
        let restored = Scheme::from_json(&json).unwrap();

        assert_eq!(restored.as_record(), scheme.as_record());
        assert_eq!(restored.elements().ids(), scheme.elements().ids());
        assert_eq!(restored.connections().ids(), scheme.connections().ids());
        assert_eq!(restored.graph().edge_count(), scheme.graph().edge_count());
        assert_eq!(
            number(restored.element_by_name("K").unwrap(), "T_In"),
            Some(315.0)
        );
        assert_eq!(number(restored.element_by_name("Tap").unwrap(), "T_In"), Some(300.0));
        assert!(!restored.element_by_name("H").unwrap().has_calculate());
    }

    #[test]
    fn test_from_record_rejects_invalid_connection() {
        let scheme = chain();
        let mut record = scheme.as_record();
        // Drop the temperature from the sink's in-port
        let sink = record.elements.iter_mut().find(|e| e.element.name == "K").unwrap();
        sink.element.in_ports[0].port.values.retain(|v| v.value.name == "G");

        let err = Scheme::from_record(record).unwrap_err();
        assert!(matches!(err, EngineError::IncompatibleSpecSet { .. }));
    }
}
