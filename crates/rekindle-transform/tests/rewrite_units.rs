//! End-to-end transform pipeline tests: primary rewrite followed by the
//! post-pass, over realistic component units.

use rekindle_transform::emit;
use rekindle_transform::postpass::{apply_post_pass, PostPassOutcome};
use rekindle_transform::rewrite::{RewriteOutcome, Transformer};
use rekindle_transform::TransformOptions;

const CARD_UNIT: &str = r#"import { LitElement, html, css } from 'lit';
import { customElement, property, state } from 'lit/decorators.js';
import { formatName } from './format.js';

@customElement("x-card")
export class Card extends LitElement {
  static styles = css`:host { display: block; }`;

  @property() heading = 'Untitled';
  @property({ type: Number }) elevation = 1;
  @state() expanded = false;

  render() {
    return html`<h2>${formatName(this.heading)}</h2>`;
  }
}

@customElement("x-card-list")
export class CardList extends LitElement {
  @property({ type: Array }) items = [];

  render() {
    return html`${this.items.length} cards`;
  }
}
"#;

fn rewrite(source: &str, unit: &str) -> (String, Vec<String>) {
    let _ = env_logger::try_init();
    let transformer = Transformer::new(TransformOptions::lit_flavored()).unwrap();
    match transformer.rewrite_unit(source, unit) {
        RewriteOutcome::Rewritten { code, names, .. } => (code, names),
        RewriteOutcome::Unchanged => panic!("unit should have been rewritten"),
    }
}

fn post_pass(code: &str) -> (String, Vec<String>) {
    match apply_post_pass(code) {
        PostPassOutcome::Rewritten { code, names } => (code, names),
        PostPassOutcome::Unchanged => panic!("post-pass should have changed the unit"),
    }
}

#[test]
fn test_two_classes_one_unit() {
    let (code, names) = rewrite(CARD_UNIT, "src/card.ts");
    assert_eq!(
        names,
        vec!["x-card".to_string(), "x-card-list".to_string()]
    );
    assert!(code.contains(
        "__rekindleDefine(\"x-card\", Card, \"src/card.ts\", [formatName]);"
    ));
    assert!(code.contains(
        "__rekindleDefine(\"x-card-list\", CardList, \"src/card.ts\", [formatName]);"
    ));
    assert_eq!(
        code.matches(emit::BOOTSTRAP_MARKER).count(),
        1,
        "bootstrap is injected once per unit"
    );
    assert_eq!(code.matches(emit::ACCEPT_MARKER).count(), 1);
}

#[test]
fn test_snapshot_payload_covers_both_classes() {
    let (code, _) = rewrite(CARD_UNIT, "src/card.ts");
    let payload_line = code
        .lines()
        .find(|l| l.starts_with(emit::SNAPSHOT_SET_PREFIX))
        .expect("snapshot payload line present");
    for field in ["heading", "elevation", "expanded", "items"] {
        assert!(
            payload_line.contains(&format!("\"name\":\"{}\"", field)),
            "payload misses {}: {}",
            field,
            payload_line
        );
    }
    assert!(payload_line.contains("\"value\":\"Untitled\""));
    assert!(payload_line.contains("\"value\":1"));
    assert!(payload_line.contains("\"value\":false"));
    assert!(payload_line.contains("\"value\":[]"));
}

#[test]
fn test_post_pass_over_lowered_output() {
    let (code, _) = rewrite(CARD_UNIT, "src/card.ts");

    // Simulate the class-field lowering a real pipeline would apply next:
    // a brand-guarded private accessor helper lands in the unit.
    let lowered = format!(
        "{}\nfunction __fieldGet(receiver, map) {{\n  if (!map.has(receiver)) {{\n    throw new TypeError(\"node does not carry the private slot\");\n  }}\n  return map.get(receiver);\n}}\n",
        code
    );

    let (finalized, names) = post_pass(&lowered);
    assert_eq!(
        names,
        vec!["x-card".to_string(), "x-card-list".to_string()]
    );
    assert!(finalized.contains("if (false) {"));
    assert!(!finalized.contains("!map.has(receiver)"));
    assert!(finalized.contains("__rekindleFinalize(\"x-card\", \"src/card.ts\");"));
    assert!(finalized.contains("__rekindleFinalize(\"x-card-list\", \"src/card.ts\");"));
    let marker_at = finalized.find(emit::FINALIZE_MARKER).unwrap();
    assert!(
        marker_at > finalized.find(emit::ACCEPT_MARKER).unwrap(),
        "finalize block is appended after the acceptance hook"
    );
}

#[test]
fn test_vanilla_preset_handles_plain_define() {
    let src = "class Meter extends HTMLElement {\n  connectedCallback() { this.textContent = 'ok'; }\n}\ncustomElements.define('x-meter', Meter);\n";
    let transformer = Transformer::new(TransformOptions::vanilla()).unwrap();
    let RewriteOutcome::Rewritten { code, names, .. } =
        transformer.rewrite_unit(src, "src/meter.js")
    else {
        panic!("expected rewrite");
    };
    assert_eq!(names, vec!["x-meter".to_string()]);
    assert!(code.contains("__rekindleDefine(\"x-meter\", Meter, \"src/meter.js\", [])"));
    assert!(code.contains(emit::SNAPSHOT_SET_PREFIX.trim_end_matches('(')));
}

#[test]
fn test_rewritten_unit_survives_second_rewrite_scan() {
    // The emitted text must not be mistaken for fresh registration sites
    // if a pipeline accidentally routes it through the transform again.
    let (code, _) = rewrite(CARD_UNIT, "src/card.ts");
    let transformer = Transformer::new(TransformOptions::lit_flavored()).unwrap();
    match transformer.rewrite_unit(&code, "src/card.ts") {
        RewriteOutcome::Unchanged => {}
        RewriteOutcome::Rewritten { names, .. } => {
            assert!(
                names.is_empty(),
                "second pass must not rediscover registrations: {:?}",
                names
            );
        }
    }
}
