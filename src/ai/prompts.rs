/// Which analysis the external call is asked to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptTemplate {
    /// Daily news item that already passed the keyword gate.
    NewsDigest,
    /// Segment of an uploaded newspaper; the model must also decide relevance.
    DocumentScreening,
}

const SYSTEM_PROMPT: &str = "You are an expert mentor for the UPSC Civil Services Examination. \
You turn news text into concise, accurate study material. Never invent facts that are not \
supported by the text or by well-established background knowledge. Use the exact section \
headers you are given, each on its own line followed by a colon.";

impl PromptTemplate {
    pub fn name(&self) -> &'static str {
        match self {
            PromptTemplate::NewsDigest => "news_digest",
            PromptTemplate::DocumentScreening => "document_screening",
        }
    }

    pub fn system_prompt(&self) -> &'static str {
        SYSTEM_PROMPT
    }

    /// Whether results must carry an explicit relevance verdict to be kept.
    pub fn gates_on_verdict(&self) -> bool {
        matches!(self, PromptTemplate::DocumentScreening)
    }

    pub fn user_prompt(&self, text: &str) -> String {
        match self {
            PromptTemplate::NewsDigest => format!(
                "Analyze this news article for UPSC Civil Services preparation.\n\n\
                 {text}\n\n\
                 Respond using exactly these sections:\n\
                 UPSC Relevance:\n[Why this matters for the exam; name the GS papers, e.g. GS2]\n\
                 Key Points:\n[One bullet per line starting with •]\n\
                 Concepts to Understand:\n[Background concepts, one bullet per line starting with •]\n\
                 Prelims Perspective:\n[2-3 questions with answers, numbered Q1, Q2, ...]\n\
                 Mains Perspective:\n[2 questions with brief answer outlines, numbered Q1, Q2]\n\
                 Static Portion:\n[Related constitutional articles, acts or historical background]\n\
                 Tags:\n[Comma-separated syllabus tags]\n\n\
                 Keep the analysis detailed but focused on exam preparation."
            ),
            PromptTemplate::DocumentScreening => format!(
                "Screen this newspaper article for UPSC Civil Services preparation.\n\n\
                 Article text:\n{text}\n\n\
                 First line must be exactly `RELEVANT: YES` or `RELEVANT: NO`.\n\
                 Ignore sports, entertainment, advertisements and personal stories without policy relevance.\n\
                 If relevant, continue with these sections:\n\
                 Summary:\n[3-4 sentences]\n\
                 Simplified Explanation:\n[Explain complex terms in simple language]\n\
                 Key Concepts:\n[One bullet per line starting with •]\n\
                 UPSC Relevance:\n[Papers and syllabus topics this relates to, e.g. GS3]\n\
                 Prelims Questions:\n[2 questions with answers, numbered Q1, Q2]\n\
                 Mains Questions:\n[2 questions with brief answer outlines, numbered Q1, Q2]\n\
                 Related Topics:\n[One bullet per line starting with •]\n\
                 Focus on government policies and schemes, economic developments, international \
                 relations, science, social issues, constitutional matters and the environment."
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompts_embed_the_item_text() {
        let prompt = PromptTemplate::NewsDigest.user_prompt("Title: Budget 2025");
        assert!(prompt.contains("Title: Budget 2025"));
        assert!(prompt.contains("Static Portion:"));
    }

    #[test]
    fn only_document_screening_gates_on_verdict() {
        assert!(PromptTemplate::DocumentScreening.gates_on_verdict());
        assert!(!PromptTemplate::NewsDigest.gates_on_verdict());
        assert!(PromptTemplate::DocumentScreening
            .user_prompt("x")
            .contains("RELEVANT: YES"));
    }
}
