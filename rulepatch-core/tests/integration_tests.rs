/// Integration tests for rulepatch-core
///
/// These tests verify:
/// 1. Compiling questionnaires from diagram models
/// 2. Binding answers back (identity round trips, tables, nested fields)
/// 3. Transformation chains followed by questionnaires and export

use std::cell::RefCell;

use rulepatch_core::{
    apply, Document, EditorConfig, EditorError, EditorSession, FieldInput, FormCompiler, FormState,
    PathQuery, Questionnaire, RuleSet, Submission, SubmittedValue, TransformError, TransformService, XsltStep,
};

const MODEL: &str = r#"<mxfile>
  <diagram>
    <mxGraphModel>
      <root>
        <mxCell id="0"/>
        <mxCell id="1" parent="0"/>
        <object id="10" type="cps_component" label="Engine">
          <mxCell vertex="1" parent="1"/>
        </object>
        <object id="20" type="boundary" label="Engine boundary">
          <mxCell vertex="1" parent="1"/>
        </object>
        <object id="30" type="owns" label="">
          <mxCell edge="1" parent="1" source="10" target="20"/>
        </object>
        <object id="40" type="comm_thread: telemetry" label="Publisher" protocol="mqtt" topic="engine/temp">
          <mxCell vertex="1" parent="20"/>
        </object>
        <object id="50" type="operational_goal" label="Sample" period="500" params='[{"name":"rate","type":"int"},{"name":"gain","type":"float"}]'>
          <mxCell vertex="1" parent="10"/>
        </object>
        <object id="60" type="sensor">
          <mxCell vertex="1" parent="1"/>
        </object>
      </root>
    </mxGraphModel>
  </diagram>
</mxfile>"#;

const RULES: &str = r#"{
  "modifications": [
    {
      "xpath": "//object[starts-with(@type, 'comm_thread')]",
      "attributes": [
        {
          "name": "protocol",
          "statement": "Which protocol does the sender use?",
          "options": ["http", "mqtt"],
          "additionalAttribute": {
            "conditional": "mqtt",
            "attribute": { "name": "topic", "statement": "Topic?", "freeTextArea": true }
          }
        }
      ]
    },
    {
      "xpath": "//object[@type='operational_goal']",
      "attributes": [
        { "name": "period", "statement": "Period (ms)?", "number": true },
        {
          "name": "params",
          "statement": "Parameters",
          "derivate_from": "params",
          "parametersTable": {
            "headers": ["name", "type", "index"],
            "dropdown_box_values": { "type": ["int", "float"] },
            "sequence_values": { "index": 1 }
          }
        }
      ]
    },
    {
      "xpath": "//object[@type='actuator']",
      "attributes": [{ "name": "power", "statement": "Power?" }]
    }
  ]
}"#;

#[test]
fn test_questionnaire_from_diagram_model() {
    let doc = Document::parse(MODEL).unwrap();
    let rules = RuleSet::from_json(RULES).unwrap();
    let groups = FormCompiler::default().compile(&doc, &rules).unwrap();

    // The actuator rule matches nothing and yields no group
    assert_eq!(groups.len(), 2);
    assert_eq!(groups[0].legend, "Engine > message sender: Publisher");
    assert_eq!(groups[1].legend, "Engine > on interval action: Sample");

    let params = &groups[1].fields[1];
    let FieldInput::Table(table) = &params.input else {
        panic!("params should be a table");
    };
    assert_eq!(table.rows.len(), 2);
    assert_eq!(table.rows[1]["name"], "gain");
    assert_eq!(table.rows[1]["index"], "");
    let titles: Vec<&str> = table.columns.iter().map(|c| c.title.as_str()).collect();
    assert_eq!(titles, vec!["Name", "Type", "Index"]);
}

#[test]
fn test_untouched_form_is_identity() {
    let mut doc = Document::parse(MODEL).unwrap();
    let before = doc.to_xml_string().unwrap();
    let rules = RuleSet::from_json(
        r#"{"modifications": [{"xpath": "//object[@label != '']", "attributes": [
            {"name": "label", "statement": "Label?"},
            {"name": "protocol", "statement": "Protocol?", "conditional": {"type": "comm_thread: telemetry"},
             "options": ["http", "mqtt"],
             "additionalAttribute": {"conditional": "mqtt", "attribute": {"name": "topic", "statement": "T?"}}}
        ]}]}"#,
    )
    .unwrap();

    let form = FormState::new(FormCompiler::default().compile(&doc, &rules).unwrap());
    let report = apply(&mut doc, &rules, &form.submission()).unwrap();

    assert!(report.is_noop(), "unexpected writes: {:?}", report.writes);
    assert!(report.unchanged > 0);
    assert_eq!(doc.to_xml_string().unwrap(), before);
}

#[test]
fn test_answers_file_applied_to_model() {
    let mut doc = Document::parse(MODEL).unwrap();
    let rules = RuleSet::from_json(RULES).unwrap();
    let submission = Submission::from_json(
        r#"{
          "modification_0_element_0_protocol": "mqtt",
          "modification_0_element_0_protocol_topic": "engine/oil",
          "modification_1_element_0_period": 1000,
          "modification_1_element_0_params": [{"name": "rate", "type": "int", "index": 1}]
        }"#,
    )
    .unwrap();

    let report = apply(&mut doc, &rules, &submission).unwrap();
    assert_eq!(report.writes.len(), 3);
    assert!(report.unused_keys.is_empty());

    let xml = doc.to_xml_string().unwrap();
    assert!(xml.contains(r#"topic="engine/oil""#));
    assert!(xml.contains(r#"period="1000""#));

    let goal = PathQuery::evaluate(&doc, "//object[@id='50']").unwrap()[0];
    assert_eq!(
        doc.attribute(goal, "params").as_deref(),
        Some(r#"[{"name":"rate","type":"int","index":"1"}]"#)
    );
}

#[test]
fn test_form_edits_round_trip_through_binder() {
    let mut doc = Document::parse(MODEL).unwrap();
    let rules = RuleSet::from_json(RULES).unwrap();
    let mut form = FormState::new(FormCompiler::default().compile(&doc, &rules).unwrap());

    form.set_value("modification_0_element_0_protocol", "http").unwrap();
    let table = form.table_mut("modification_1_element_0_params").unwrap();
    table.remove_row(0).unwrap();
    let row = table.add_row();
    table.set_cell(row, "name", "offset").unwrap();

    let submission = form.submission();
    assert!(submission.get("modification_0_element_0_protocol_topic").is_none());
    let Some(SubmittedValue::Rows(rows)) = submission.get("modification_1_element_0_params") else {
        panic!("expected rows");
    };
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1]["index"], "1");

    apply(&mut doc, &rules, &submission).unwrap();
    let reparsed = Document::parse(&doc.to_xml_string().unwrap()).unwrap();
    let groups = FormCompiler::default().compile(&reparsed, &rules).unwrap();
    let FieldInput::Table(table) = &groups[1].fields[1].input else {
        panic!("params should be a table");
    };
    assert_eq!(table.rows[0]["name"], "gain");
    assert_eq!(table.rows[1]["name"], "offset");
    assert_eq!(groups[0].fields[0].current_value.as_deref(), Some("http"));
    // The topic stays as it was
    assert_eq!(groups[0].fields[0].nested.as_ref().unwrap().field.current_value.as_deref(), Some("engine/temp"));
}

/// Wraps the input in an element named by the stylesheet content; `fail` fails
#[derive(Default)]
struct RenamingService {
    inputs: RefCell<Vec<String>>,
}

impl TransformService for RenamingService {
    fn transform(&self, input_xml: &str, step: &XsltStep) -> Result<String, TransformError> {
        self.inputs.borrow_mut().push(input_xml.to_string());
        if step.content == "fail" {
            return Err(TransformError::Http("connection refused".into()));
        }
        Ok(format!("<{}>{}</{}>", step.content, input_xml, step.content))
    }
}

#[test]
fn test_chain_failure_exports_previous_step() {
    let service = RenamingService::default();
    let mut session = EditorSession::new(EditorConfig::default());
    session.load_document("<cim/>").unwrap();
    session.add_xslt("CIM-PIM.xsl", "pim");
    session.add_xslt("CIM-PIM-Aux.xsl", "fail");

    let error = session.run_transformations(&service).unwrap_err();
    assert!(matches!(error, EditorError::RemoteTransformFailure { step: 1, .. }));

    let inputs = service.inputs.borrow();
    assert_eq!(inputs[1], "<pim><cim/></pim>", "step 2 gets step 1 output verbatim");
    assert_eq!(session.export().unwrap().content, "<pim><cim/></pim>");
}

#[test]
fn test_transform_then_questionnaire() {
    let service = RenamingService::default();
    let mut session = EditorSession::new(EditorConfig::default());
    session.load_document(r#"<item label="A"/>"#).unwrap();
    session.add_xslt("wrap.xsl", "model");
    session
        .load_rules(
            "rules.json",
            r#"{"modifications": [{"xpath": "/model/item", "attributes": [{"name": "size", "statement": "Size?", "number": true}]}]}"#,
        )
        .unwrap();

    assert_eq!(session.run_transformations(&service).unwrap(), 1);
    let Questionnaire::Ready(form) = session.questionnaire().unwrap() else {
        panic!("expected a form");
    };
    assert_eq!(form.groups()[0].legend, "unknown type: A");
    assert_eq!(form.value("modification_0_element_0_size"), Some("200"));

    session.submit(&form.submission()).unwrap();
    assert_eq!(session.export().unwrap().content, r#"<model><item label="A" size="200"/></model>"#);
}
