//! Prompt construction for each analysis kind.
//!
//! A single declarative table maps every [`AnalysisKind`] to its fixed
//! system prompt, sampling temperature, and max-token budget. User prompts
//! are templated from the document content (and the question, for
//! `document_qa`). Building a prompt is a pure function of its inputs, so
//! identical requests always produce identical prompts.
//!
//! Content is truncated to a fixed character limit before embedding, with a
//! notice appended when truncation occurs. This bounds cost and latency
//! deterministically regardless of document size.

use crate::models::AnalysisKind;

/// Default cap on document content embedded into a prompt.
pub const DEFAULT_MAX_CONTENT_CHARS: usize = 8_000;

/// A system + user prompt pair ready for the completion API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

/// Fixed per-kind completion parameters.
#[derive(Debug, Clone, Copy)]
pub struct PromptSpec {
    pub system: &'static str,
    pub temperature: f32,
    pub max_tokens: u32,
}

const CLAUSE_EXTRACTION_SYSTEM: &str = r#"You are a legal contract analysis expert specializing in clause extraction. Analyze the following contract and extract all legally significant clauses.

Format your response as JSON with these exact keys:
{
  "clauses": [
    {
      "type": "string (e.g., 'Confidentiality', 'Termination', 'Indemnity', 'Governing Law', 'Force Majeure', 'Dispute Resolution', 'Payment', 'Liability')",
      "found": true,
      "content": "string (the actual clause text, 2-3 sentences)",
      "riskLevel": "Low|Medium|High",
      "riskExplanation": "string (brief explanation of why this risk level)",
      "complianceStatus": "Compliant|Partially Compliant|Non-Compliant",
      "keyTerms": ["string array of key terms within the clause"],
      "recommendations": ["string array of recommendations for this clause"]
    }
  ],
  "missingClauses": [
    {
      "type": "string (e.g., 'Force Majeure', 'Dispute Resolution', 'Arbitration')",
      "riskLevel": "Low|Medium|High",
      "riskExplanation": "string (why missing this clause is risky)"
    }
  ],
  "summary": {
    "totalClauses": "number",
    "highRiskClauses": "number",
    "mediumRiskClauses": "number",
    "lowRiskClauses": "number",
    "complianceScore": "number (0-100)",
    "overallRisk": "Low|Medium|High"
  }
}"#;

const RISK_ASSESSMENT_SYSTEM: &str = r#"You are a legal risk assessment expert. Analyze the following contract for potential risks and provide detailed risk scoring.

Format your response as JSON with these exact keys:
{
  "overallRiskScore": "number (1-10)",
  "overallRiskLevel": "Low|Medium|High",
  "riskBreakdown": {
    "financial": {
      "score": "number (1-10)",
      "risks": ["string array of financial risks with brief explanations"],
      "mitigation": ["string array of risk mitigation strategies"]
    },
    "legal": {
      "score": "number (1-10)",
      "risks": ["string array of legal risks with brief explanations"],
      "mitigation": ["string array of risk mitigation strategies"]
    },
    "operational": {
      "score": "number (1-10)",
      "risks": ["string array of operational risks with brief explanations"],
      "mitigation": ["string array of risk mitigation strategies"]
    },
    "reputational": {
      "score": "number (1-10)",
      "risks": ["string array of reputational risks with brief explanations"],
      "mitigation": ["string array of risk mitigation strategies"]
    }
  },
  "criticalIssues": ["string array of critical issues requiring immediate attention"],
  "redFlags": ["string array of specific red flags found in the contract"],
  "recommendations": ["string array of overall recommendations"]
}"#;

const COMPLIANCE_CHECK_SYSTEM: &str = r#"You are a legal compliance expert. Analyze the following contract for compliance with legal requirements and regulatory standards.

Format your response as JSON with these exact keys:
{
  "complianceStatus": "Compliant|Partially Compliant|Non-Compliant",
  "complianceScore": "number (0-100)",
  "regulatoryAreas": {
    "dataProtection": {
      "status": "Compliant|Partially Compliant|Non-Compliant",
      "issues": ["string array of compliance issues"],
      "requirements": ["string array of requirements met"]
    },
    "employment": {
      "status": "Compliant|Partially Compliant|Non-Compliant",
      "issues": ["string array of compliance issues"],
      "requirements": ["string array of requirements met"]
    },
    "intellectualProperty": {
      "status": "Compliant|Partially Compliant|Non-Compliant",
      "issues": ["string array of compliance issues"],
      "requirements": ["string array of requirements met"]
    },
    "tax": {
      "status": "Compliant|Partially Compliant|Non-Compliant",
      "issues": ["string array of compliance issues"],
      "requirements": ["string array of requirements met"]
    }
  },
  "missingRequirements": ["string array of missing compliance requirements"],
  "missingClauses": ["string array of commonly expected clauses that are missing"],
  "nonStandardTerms": ["string array of terms that deviate from standard practice"],
  "recommendations": ["string array of compliance recommendations"]
}"#;

const COMPREHENSIVE_SYSTEM: &str = r#"You are a legal contract analysis expert. Provide a comprehensive analysis of the following contract including clause extraction, risk assessment, and compliance check.

Format your response as JSON with these exact keys:
{
  "contractOverview": {
    "type": "string",
    "purpose": "string",
    "parties": ["string array"],
    "effectiveDate": "string",
    "term": "string"
  },
  "clauses": [
    {
      "type": "string",
      "content": "string",
      "riskLevel": "Low|Medium|High",
      "complianceStatus": "Compliant|Partially Compliant|Non-Compliant"
    }
  ],
  "riskAssessment": {
    "overallScore": "number (1-10)",
    "highRiskAreas": ["string array"],
    "riskBreakdown": {
      "financial": "number (1-10)",
      "legal": "number (1-10)",
      "operational": "number (1-10)",
      "reputational": "number (1-10)"
    }
  },
  "complianceCheck": {
    "overallStatus": "Compliant|Partially Compliant|Non-Compliant",
    "complianceScore": "number (0-100)",
    "regulatoryIssues": ["string array"]
  },
  "recommendations": ["string array"],
  "summary": "string"
}"#;

const DOCUMENT_QA_SYSTEM: &str = "You are a legal document assistant. Provide helpful, \
accurate legal information based on the document content.";

const SUMMARIZATION_SYSTEM: &str = "You are a legal document summarizer.";

const MERGE_SUMMARIES_SYSTEM: &str = "You are a concise summarizer.";

const CONTRACT_COMPARISON_SYSTEM: &str = r#"You are an expert contract lawyer. Compare the following contract against standard legal templates and identify:

1. **Deviations from Standards**: What clauses differ from standard templates
2. **Missing Standard Provisions**: What standard clauses are missing
3. **Non-Standard Terms**: Any unusual or non-standard terms
4. **Industry Best Practices**: How it compares to industry standards
5. **Recommendations**: Specific suggestions for improvement

Return your analysis in JSON format:
{
  "deviations": ["list of deviations from standards"],
  "missingProvisions": ["list of missing standard provisions"],
  "nonStandardTerms": ["list of non-standard terms"],
  "industryComparison": "how it compares to industry standards",
  "recommendations": ["list of recommendations"],
  "overallAssessment": "overall assessment of the contract"
}"#;

/// Fixed parameters for each analysis kind. Structured kinds run cold
/// (0.2); free-text kinds get a little more headroom.
pub fn spec_for(kind: AnalysisKind) -> PromptSpec {
    match kind {
        AnalysisKind::ClauseExtraction => PromptSpec {
            system: CLAUSE_EXTRACTION_SYSTEM,
            temperature: 0.2,
            max_tokens: 3000,
        },
        AnalysisKind::RiskAssessment => PromptSpec {
            system: RISK_ASSESSMENT_SYSTEM,
            temperature: 0.2,
            max_tokens: 3000,
        },
        AnalysisKind::ComplianceCheck => PromptSpec {
            system: COMPLIANCE_CHECK_SYSTEM,
            temperature: 0.2,
            max_tokens: 3000,
        },
        AnalysisKind::Comprehensive => PromptSpec {
            system: COMPREHENSIVE_SYSTEM,
            temperature: 0.3,
            max_tokens: 3000,
        },
        AnalysisKind::DocumentQa => PromptSpec {
            system: DOCUMENT_QA_SYSTEM,
            temperature: 0.3,
            max_tokens: 1024,
        },
        AnalysisKind::Summarization => PromptSpec {
            system: SUMMARIZATION_SYSTEM,
            temperature: 0.3,
            max_tokens: 1024,
        },
        AnalysisKind::ContractComparison => PromptSpec {
            system: CONTRACT_COMPARISON_SYSTEM,
            temperature: 0.3,
            max_tokens: 1500,
        },
    }
}

/// Truncate `content` to at most `max_chars` characters, appending a notice
/// when anything was dropped. Returns the (possibly truncated) content and
/// whether truncation occurred.
pub fn truncate_content(content: &str, max_chars: usize) -> (String, bool) {
    match content.char_indices().nth(max_chars) {
        Some((split, _)) => {
            let mut out = content[..split].to_string();
            out.push_str(&format!(
                "\n\n[Content truncated due to length. Only the first {} characters are shown.]",
                max_chars
            ));
            (out, true)
        }
        None => (content.to_string(), false),
    }
}

/// Build the system + user prompt pair for one analysis invocation.
///
/// `question` is embedded only for `document_qa`; `document_name` labels the
/// content for kinds whose templates reference the file. Pure: identical
/// inputs yield identical prompts.
pub fn build_prompt(
    kind: AnalysisKind,
    content: &str,
    question: Option<&str>,
    document_name: &str,
    max_content_chars: usize,
) -> Prompt {
    let (content, _) = truncate_content(content, max_content_chars);
    let spec = spec_for(kind);
    let user = match kind {
        AnalysisKind::ClauseExtraction => format!(
            "Extract all legally significant clauses from this contract. Identify what's \
             present and what's missing. For each clause found, provide the actual text and \
             assess risk level. For missing clauses, explain the risk of not having them. \
             Be thorough and accurate.\n\n{}",
            content
        ),
        AnalysisKind::RiskAssessment => format!(
            "Analyze this contract for potential risks. Focus on identifying red flags, \
             unusual terms, missing protections, and areas that could expose the parties to \
             financial, legal, operational, or reputational harm. Be specific about what \
             makes each risk high, medium, or low.\n\n{}",
            content
        ),
        AnalysisKind::ComplianceCheck => format!(
            "Check this contract for compliance with standard legal requirements. Identify \
             missing clauses, non-standard terms, and areas where the contract may not meet \
             industry standards or regulatory requirements. Compare against standard \
             contract templates.\n\n{}",
            content
        ),
        AnalysisKind::Comprehensive => {
            format!("Provide comprehensive analysis of this contract:\n\n{}", content)
        }
        AnalysisKind::DocumentQa => format!(
            "Given the following document: {}, answer this question: {}\n\nDocument Content:\n{}",
            document_name,
            question.unwrap_or_default(),
            content
        ),
        AnalysisKind::Summarization => {
            format!("Summarize the following text:\n\n{}", content)
        }
        AnalysisKind::ContractComparison => format!(
            "Please compare this contract against standard legal templates:\n\nContract: {}\n\
             Content: {}\n\nProvide a detailed comparison analysis.",
            document_name, content
        ),
    };
    Prompt {
        system: spec.system.to_string(),
        user,
    }
}

/// Prompt for summarizing a single chunk of a long document. Chunks are
/// already budget-sized, so no truncation is applied here.
pub fn chunk_summary_prompt(chunk: &str) -> Prompt {
    Prompt {
        system: SUMMARIZATION_SYSTEM.to_string(),
        user: format!("Summarize the following text:\n\n{}", chunk),
    }
}

/// Prompt for merging per-chunk summaries into one final summary.
pub fn merge_summaries_prompt(partials: &[String]) -> Prompt {
    Prompt {
        system: MERGE_SUMMARIES_SYSTEM.to_string(),
        user: format!(
            "Combine these summaries into one cohesive summary:\n\n{}",
            partials.join("\n\n")
        ),
    }
}

// ============ Document drafting (transcript → legal document) ============

/// Document types the drafting endpoint can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftKind {
    EngagementLetter,
    Nda,
    DemandLetter,
    Contract,
    Memo,
    Custom,
}

impl DraftKind {
    pub fn parse(s: &str) -> Self {
        match s {
            "engagement_letter" => DraftKind::EngagementLetter,
            "nda" => DraftKind::Nda,
            "demand_letter" => DraftKind::DemandLetter,
            "contract" => DraftKind::Contract,
            "memo" => DraftKind::Memo,
            _ => DraftKind::Custom,
        }
    }

    fn instruction(&self) -> &'static str {
        match self {
            DraftKind::EngagementLetter => {
                "Create a professional engagement letter for legal services."
            }
            DraftKind::Nda => "Draft a comprehensive Non-Disclosure Agreement (NDA).",
            DraftKind::DemandLetter => "Write a formal demand letter.",
            DraftKind::Contract => "Generate a legal contract.",
            DraftKind::Memo => "Prepare a legal memorandum.",
            DraftKind::Custom => "Create a legal document",
        }
    }
}

/// Sampling parameters for document drafting.
pub const DRAFT_TEMPERATURE: f32 = 0.3;
pub const DRAFT_MAX_TOKENS: u32 = 4000;

/// Build the drafting prompt for generating a legal document from a
/// transcript or dictated notes.
pub fn build_draft_prompt(kind: DraftKind, transcript: &str, title: &str) -> Prompt {
    let system = "You are an expert legal document drafter. Generate professional, legally \
                  sound documents with proper formatting and structure. Include all necessary \
                  clauses, sections, and legal language appropriate for the document type."
        .to_string();
    let user = format!(
        "{}\n\nBased on the following transcript/notes, create a complete legal document:\n\n\
         \"{}\"\n\nDocument Title: {}\n\nProvide a fully formatted document with:\n\
         - Proper heading and title\n- Introduction/preamble\n\
         - Numbered sections and subsections\n- All necessary legal clauses\n\
         - Signature blocks\n- Date placeholders\n\n\
         Format the document professionally and ensure it's ready for review and use.",
        kind.instruction(),
        transcript,
        title
    );
    Prompt { system, user }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_prompt_is_deterministic() {
        let a = build_prompt(AnalysisKind::RiskAssessment, "some contract", None, "c.pdf", 8000);
        let b = build_prompt(AnalysisKind::RiskAssessment, "some contract", None, "c.pdf", 8000);
        assert_eq!(a, b);
    }

    #[test]
    fn each_kind_has_distinct_system_prompt() {
        let kinds = [
            AnalysisKind::ClauseExtraction,
            AnalysisKind::RiskAssessment,
            AnalysisKind::ComplianceCheck,
            AnalysisKind::Comprehensive,
            AnalysisKind::DocumentQa,
            AnalysisKind::Summarization,
            AnalysisKind::ContractComparison,
        ];
        for (i, a) in kinds.iter().enumerate() {
            for b in &kinds[i + 1..] {
                assert_ne!(spec_for(*a).system, spec_for(*b).system);
            }
        }
    }

    #[test]
    fn truncation_appends_notice_and_bounds_length() {
        let content = "x".repeat(10_000);
        let (out, truncated) = truncate_content(&content, 8_000);
        assert!(truncated);
        assert!(out.contains("[Content truncated due to length"));
        assert!(out.contains("8000 characters"));
        // Bounded: limit plus notice, nothing more.
        let notice_len = out.len() - 8_000;
        assert!(notice_len < 120, "notice unexpectedly long: {}", notice_len);
    }

    #[test]
    fn short_content_is_not_truncated() {
        let (out, truncated) = truncate_content("short", 8_000);
        assert!(!truncated);
        assert_eq!(out, "short");
    }

    #[test]
    fn question_is_embedded_for_document_qa() {
        let p = build_prompt(
            AnalysisKind::DocumentQa,
            "body",
            Some("What is the notice period?"),
            "lease.pdf",
            8000,
        );
        assert!(p.user.contains("What is the notice period?"));
        assert!(p.user.contains("lease.pdf"));
    }

    #[test]
    fn truncated_prompt_stays_within_budget_plus_notice() {
        let content = "y".repeat(50_000);
        let p = build_prompt(AnalysisKind::Comprehensive, &content, None, "big.pdf", 8_000);
        // Template overhead for this kind is well under 200 chars.
        assert!(p.user.len() < 8_000 + 200);
    }

    #[test]
    fn draft_kind_parses_known_and_falls_back() {
        assert_eq!(DraftKind::parse("nda"), DraftKind::Nda);
        assert_eq!(DraftKind::parse("memo"), DraftKind::Memo);
        assert_eq!(DraftKind::parse("mystery"), DraftKind::Custom);
    }
}
