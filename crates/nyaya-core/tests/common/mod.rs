//! Shared statute fixture for integration tests.

#![allow(dead_code)]

use nyaya_core::{
    Audience, Clause, Definition, Edge, Graph, Node, NodeId, Pipeline, PipelineConfig, Right,
    Section, Snapshot, SnapshotStore,
};
use std::sync::Arc;

pub const ACT: &str = "Consumer Protection Act, 2019";

fn section(id: &str, number: &str, chapter: &str, title: &str, text: &str) -> Node {
    Node::Section(Section {
        id: NodeId::from(id),
        act: ACT.to_string(),
        number: number.to_string(),
        title: title.to_string(),
        text: text.to_string(),
        chapter: Some(chapter.to_string()),
        page: None,
        effective_date: None,
    })
}

fn clause(id: &str, parent: &str, label: &str, text: &str) -> Node {
    Node::Clause(Clause {
        id: NodeId::from(id),
        parent_section_id: NodeId::from(parent),
        label: label.to_string(),
        text: text.to_string(),
        clause_type: Some("definition".to_string()),
    })
}

/// A slice of the Consumer Protection Act with a reference cycle
/// (35 <-> 39) and a three-hop chain from the defect scenario to the
/// redressal right.
pub fn nodes() -> Vec<Node> {
    vec![
        section(
            "CPA_S2",
            "2",
            "I",
            "Definitions",
            "In this Act, unless the context otherwise requires,",
        ),
        clause(
            "CPA_S2_C7",
            "CPA_S2",
            "(7)",
            "\"consumer\" means any person who buys any goods for a consideration",
        ),
        clause(
            "CPA_S2_C9",
            "CPA_S2",
            "(9)",
            "\"consumer rights\" includes the right to seek redressal against unfair trade practice",
        ),
        Node::Definition(Definition {
            id: NodeId::from("DEF_consumer"),
            term: "consumer".to_string(),
            text: "any person who buys any goods for a consideration which has been paid or promised"
                .to_string(),
            defined_in_section_id: NodeId::from("CPA_S2"),
            clause_ref: None,
        }),
        Node::Definition(Definition {
            id: NodeId::from("DEF_defect"),
            term: "defect".to_string(),
            text: "any fault, imperfection or shortcoming in the quality, quantity, potency, \
                   purity or standard of goods"
                .to_string(),
            defined_in_section_id: NodeId::from("CPA_S2"),
            clause_ref: Some("(10)".to_string()),
        }),
        Node::Right(Right {
            id: NodeId::from("RIGHT_redressal"),
            description: "right to seek redressal against unfair trade practice".to_string(),
            granted_by_clause_id: NodeId::from("CPA_S2_C9"),
            beneficiary: Some("consumer".to_string()),
            right_type: Some("remedial".to_string()),
        }),
        section(
            "CPA_S18",
            "18",
            "III",
            "Powers and functions of Central Authority",
            "The Central Authority shall protect, promote and enforce the rights of consumers as a class",
        ),
        section(
            "CPA_S21",
            "21",
            "III",
            "Power of Central Authority to issue directions and penalties against false or misleading advertisement",
            "Where the Central Authority is satisfied after investigation that any advertisement is false or misleading",
        ),
        section(
            "CPA_S35",
            "35",
            "IV",
            "Manner in which complaint shall be made",
            "A complaint, in relation to any goods sold or delivered or any service provided, \
             may be filed with a District Commission by the consumer",
        ),
        section(
            "CPA_S39",
            "39",
            "IV",
            "Findings of District Commission",
            "Where the District Commission is satisfied that the goods complained against suffer \
             from any of the defects specified in the complaint, it shall issue an order to \
             remove the defect or to replace the goods",
        ),
    ]
}

pub fn edges() -> Vec<Edge> {
    vec![
        Edge::Contains {
            parent: NodeId::from("CPA_S2"),
            child: NodeId::from("CPA_S2_C7"),
        },
        Edge::Contains {
            parent: NodeId::from("CPA_S2"),
            child: NodeId::from("CPA_S2_C9"),
        },
        Edge::Defines {
            source_section: NodeId::from("CPA_S2"),
            target_definition: NodeId::from("DEF_defect"),
        },
        Edge::References {
            from: NodeId::from("CPA_S35"),
            to: NodeId::from("CPA_S39"),
            context_text: Some("orders on a complaint".to_string()),
        },
        Edge::References {
            from: NodeId::from("CPA_S39"),
            to: NodeId::from("CPA_S35"),
            context_text: None,
        },
        Edge::References {
            from: NodeId::from("CPA_S21"),
            to: NodeId::from("CPA_S18"),
            context_text: Some("directions of the Central Authority".to_string()),
        },
    ]
}

pub fn graph() -> Graph {
    Graph::new(nodes(), edges()).unwrap()
}

pub fn snapshot(version: &str) -> Snapshot {
    Snapshot::new(version, chrono::NaiveDate::from_ymd_opt(2024, 1, 1), graph()).unwrap()
}

pub fn pipeline() -> Pipeline {
    let store = Arc::new(SnapshotStore::new(snapshot("cpa-2019-v1")));
    Pipeline::new(store, &PipelineConfig::default()).unwrap()
}

/// A pipeline over the fixture with a custom configuration.
pub fn pipeline_with(config: &PipelineConfig) -> Pipeline {
    let store = Arc::new(SnapshotStore::new(snapshot("cpa-2019-v1")));
    Pipeline::new(store, config).unwrap()
}

/// Context limits only; everything else at its default.
pub fn budget_config(max_context_chars: usize) -> PipelineConfig {
    PipelineConfig {
        max_context_chars,
        citizen_budget_percent: 100,
        ..PipelineConfig::default()
    }
}

pub fn citation(locator: &str) -> String {
    format!("{ACT}, {locator}")
}

pub const AUDIENCES: [Audience; 3] = Audience::ALL;
