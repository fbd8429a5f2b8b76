//! file_search simulator: canned document matches for a query.

use serde_json::Value;

use crate::declarations::FILE_SEARCH_FUNCTION;
use crate::simulator::{SimulatedTool, string_arg};

pub struct FileSearchSimulator;

struct CannedDocument {
    file: &'static str,
    relevance: &'static str,
    template: &'static str,
}

const DOCUMENTS: [CannedDocument; 3] = [
    CannedDocument {
        file: "document1.pdf",
        relevance: "High",
        template: "This document contains information about {query} and related topics.",
    },
    CannedDocument {
        file: "presentation.pptx",
        relevance: "Medium",
        template: "Slides covering key aspects of {query} with diagrams and examples.",
    },
    CannedDocument {
        file: "notes.txt",
        relevance: "Medium",
        template: "Meeting notes discussing {query} implementation details.",
    },
];

impl SimulatedTool for FileSearchSimulator {
    fn name(&self) -> &str {
        FILE_SEARCH_FUNCTION
    }

    fn simulate(&self, args: &Value) -> String {
        let query = string_arg(args, "query");
        let mut out = format!("File search results for \"{query}\":\n\n");
        for (i, doc) in DOCUMENTS.iter().enumerate() {
            out.push_str(&format!(
                "{}. {}\n   Relevance: {}\n   Excerpt: \"{}\"\n\n",
                i + 1,
                doc.file,
                doc.relevance,
                doc.template.replace("{query}", query),
            ));
        }
        out.push_str("Source: Simulated File Search (for demonstration purposes)");
        out
    }
}
