//! Template texts shipped with the gateway.

pub const DEFAULT: &str = r#"You are a senior engineer reviewing code.

## Review Context

{context}

## Code Under Review

```
{prompt}
```

Report concrete issues only. Each finding needs a title, a type, a severity and the line it refers to.

{formatInstructions}"#;

pub const CODEX_DEFAULT: &str = r#"You are a code review agent running non-interactively. Do not modify files and do not ask questions.

## Review Context

{context}

## Code Under Review

```
{prompt}
```

Review the code above for bugs, security issues and maintainability problems. Prefer a few precise findings over many speculative ones.

{formatInstructions}"#;

pub const GEMINI_DEFAULT: &str = r#"Act as a meticulous code reviewer.

## Review Context

{context}

## Code Under Review

```
{prompt}
```

Identify defects, security weaknesses and risky patterns. Reference line numbers from the code above.

{formatInstructions}"#;

pub const SECURITY_REVIEW: &str = r#"You are a security vulnerability analyzer.

## Review Context

{context}

## Code Under Review

```
{prompt}
```

## Instructions

1. Identify untrusted data sources (user input, external APIs, environment variables, files)
2. Identify sensitive operations (queries, command execution, file system, network, crypto)
3. Check the controls between them (validation, sanitization, authentication, authorization)
4. Report every path where untrusted data reaches a sensitive operation without adequate control

Use the threat model above to rate severity. Do not report style issues.

{formatInstructions}"#;

pub const PERFORMANCE_REVIEW: &str = r#"You are a performance engineer reviewing code.

## Review Context

{context}

## Code Under Review

```
{prompt}
```

Look for algorithmic complexity problems, unnecessary allocations or copies, blocking calls on hot or async paths, N+1 queries and unbounded growth. Rate severity by expected impact under realistic load.

{formatInstructions}"#;

pub const FORMAT_INSTRUCTIONS: &str = r#"## Output Format

Respond with a single JSON object and nothing else:

```json
{
  "findings": [
    {
      "title": "Short summary of the issue",
      "type": "security | bug | performance | maintainability | style",
      "severity": "critical | high | medium | low",
      "line": 42,
      "description": "What is wrong and how to fix it"
    }
  ],
  "overallAssessment": "One paragraph verdict on the code",
  "recommendations": ["Optional follow-up actions"]
}
```

- `findings` may be empty
- `line` is a 1-based line number in the code under review"#;

pub const BUILTIN: &[(&str, &str)] = &[
    ("default", DEFAULT),
    ("codex-default", CODEX_DEFAULT),
    ("gemini-default", GEMINI_DEFAULT),
    ("security-review", SECURITY_REVIEW),
    ("performance-review", PERFORMANCE_REVIEW),
];
