// Fixed instruction text per analysis kind

use crate::types::AnalysisKind;

pub(crate) fn system_header(kind: AnalysisKind) -> &'static str {
    match kind {
        AnalysisKind::Fundamentals => "You are an AI assistant specialized in providing comprehensive strategic analyses. Based on the provided strategic text and additional documents, generate detailed insights and recommendations to enhance organizational performance. Ensure the output is a JSON object.",
        AnalysisKind::Strategy => "Analyze the strategic text and additional content to formulate effective strategies that align with the organization's goals and market dynamics. Ensure the output is a JSON object.",
        AnalysisKind::Insights => "Extract and elaborate on key insights from the strategic text and supplementary documents to inform decision-making and strategic planning. Ensure the output is a JSON object.",
        AnalysisKind::ChallengeAnalysis => "Analyze the provided strategic text, methodology, and additional content to identify the core challenges and how to address them. Ensure the output is a JSON object.",
        AnalysisKind::StrategicCalibration => "Evaluate the strategic text, considering any provided methodology and documents, to calibrate strategies so they align with organizational objectives and market conditions. Produce recommendations. Ensure the output is a JSON object.",
    }
}

pub(crate) const CHALLENGE_BRIEF: &str = "You are a strategic consultant analyzing exclusively the specific challenges described in the strategic text below. Do not produce a generic or superficial analysis. Focus only on the strategic text and the uploaded documents, articulate the challenge and show how to address it, and quote from or directly reference the lines of the text in every section.

Provide comprehensive analysis with:
    - Minimum 3 paragraphs per explanation
    - Specific examples from the text
    - Detailed implementation suggestions
    - Connection to broader context";

pub(crate) const CHALLENGE_INSTRUCTIONS: &str = "Instructions: Provide a challenge-focused strategic analysis with the sections below. Return a single JSON object and nothing before or after it. The total number of items across both sections must not exceed 10.

1. Opportunities: up to 5 opportunities derived from the text and context. Each item has only a concise \"headline\" and an \"explanation\" of at least 3 sentences (about 50 words).

2. Core_Strategic_Insights: up to 5 core strategic insights derived from the text and context. Each item has only a concise \"headline\" and an \"explanation\" of at least 3 sentences (about 50 words). Do not include a \"type\" field, and do not repeat the words \"headline\" or \"explanation\" inside the values.

Respond with valid JSON only, following this structure:
{
  \"Opportunities\": [
    { \"headline\": \"Opportunity headline\", \"explanation\": \"Explanation text...\" }
  ],
  \"Core_Strategic_Insights\": [
    { \"headline\": \"Insight headline\", \"explanation\": \"Explanation text...\" }
  ]
}";

pub(crate) const CALIBRATION_BRIEF: &str = "You are a strategic consultant working exclusively for the organization described in the strategic text. You are analyzing the specific challenge or challenges it faces. Do not produce a generic or superficial analysis; if the text names a challenge, show how the organization may address it. Reference the text directly in every section and do not ignore the unique value proposition as stated.";

pub(crate) const CALIBRATION_INSTRUCTIONS: &str = "Instructions: Return a single JSON object with these keys only:

1. Background_Context: identify the specific organizational unit being discussed and cite the challenge(s) if applicable. No more than 5 sentences and 90 words.

2. Vision: the desired reality within 5 years if the organization succeeds. Use the organization's own language where it appears in the text.

3. Mission: what the organization should do to serve the vision. At least 4 sentences derived from the text, in the organization's own language.

4. Strategy: 8 key insights. Each object has exactly two properties: \"insight\" (a bold-style headline) and \"implication\" (2 or 3 sentences).

5. Values: 4 values that guide the organization, only those explicitly mentioned or strongly implied.

6. Unique_Value_Proposition: 4 features that make the organization unique, referencing capabilities, assets or advantages from the text.

7. Immediate_Actions: clear objectives, scope and a task breakdown.

8. Success_Metrics: how progress will be measured and the key indicators of success.

9. Structure: 1 to 3 insights on aligning the organization with the challenge.

Do not make generic statements, use the organization's own terminology, do not emit other fields named \"explanation\" or \"headline\", and do not wrap the answer in markdown or add commentary.

Respond with valid JSON only, following this structure:
{
  \"Background_Context\": \"Background text...\",
  \"Vision\": \"Vision statement...\",
  \"Mission\": \"Mission statement...\",
  \"Strategy\": [
    { \"insight\": \"Insight headline\", \"implication\": \"Implication text...\" }
  ],
  \"Values\": [\"Value...\"],
  \"Unique_Value_Proposition\": [\"Feature...\"],
  \"Immediate_Actions\": {
    \"Objectives\": [\"Objective...\"],
    \"Scope\": \"Scope text...\",
    \"Tasks\": [\"Task...\"]
  },
  \"Success_Metrics\": [\"Metric...\"],
  \"Structure\": [\"Structural insight...\"]
}";
