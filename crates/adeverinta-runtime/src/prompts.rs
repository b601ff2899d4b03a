//! System prompt for the language collaborator.
//!
//! The prompt is assembled from:
//! 1. A fixed role and output contract (shared by every turn)
//! 2. The form fields with their allowed values (derived from the schema)
//! 3. The reason lists and the snippets retrieved for this turn
//!
//! The collaborator's answer is advisory. The deterministic machine decides
//! the status; the prompt only has to make the extraction good.

use adeverinta_core::form::{Domain, FormSchema, Requirement};
use adeverinta_core::{ReasonPolicy, RetrievalResult};
use std::fmt::Write;

/// Role and output contract.
pub const BASE_SYSTEM_PROMPT: &str = r#"
Esti asistentul administrativ al secretariatului pentru cereri de adeverinta de student.
Respecti DOAR regulile din sectiunea POLICY SNIPPETS.
Raspunzi scurt, in limba romana, fara diacritice.

## Format de iesire (obligatoriu)
Intorci un singur obiect JSON, fara alt text, cu cheile:
- status: "forbidden" | "need_info" | "ready"
- message: o propozitie scurta
- payload: doar campurile deja colectate (nume de camp -> valoare text)
- missing_fields: toate campurile care mai lipsesc (gol daca status != "need_info")
- next_question: intrebare pentru 1-3 campuri din missing_fields (gol daca status != "need_info")
- instructions: doar cand status == "ready", altfel ""
- policy_used: id-urile fragmentelor pe care te-ai bazat
- reason: motivul declarat de utilizator, exact cum l-a spus (omite daca nu l-a spus)

## Reguli
1. Un motiv este interzis DOAR daca apare explicit in lista motivelor interzise.
2. Daca motivul este interzis: status "forbidden", payload {}, missing_fields [].
3. Daca motivul nu apare in nicio lista, ceri clarificarea motivului.
4. Nu intrebi din nou un camp deja primit; il pastrezi in payload.
5. O cerere per motiv. Daca utilizatorul da mai multe motive, i-o amintesti.
6. Nu pretinzi ca ai depus cererea.

## Indicii de extragere
- "pentru mine" -> persoana_beneficiar = "-"
- institutie sau judet care nu se aplica -> "-"
- "vreau medie" -> medie_pe_adeverinta = "Da"; "nu vreau medie" -> "Nu"
- "prelungire" -> regim_studiu = "prelungire studii"
- "1", "2", "3", "M1", "M2", "2020-2023" -> an_studiu
"#;

/// Render the field list with domains and conditions.
pub fn fields_section(schema: &FormSchema) -> String {
    let mut out = String::from("## Campuri (doar acestea)\n");
    for spec in schema.fields() {
        let _ = write!(out, "- {} ({})", spec.name, spec.name.label());
        match &spec.domain {
            Domain::Choice(options) => {
                let _ = write!(out, ": {}", options.join(" | "));
            }
            Domain::TextOrNotApplicable => out.push_str(": text sau \"-\""),
            _ => {}
        }
        if let Requirement::When { field, equals } = &spec.requirement {
            let _ = write!(out, " [doar daca {} == \"{}\"]", field, equals);
        }
        out.push('\n');
    }
    out
}

/// Render the reason lists.
pub fn reasons_section(policy: &ReasonPolicy) -> String {
    let mut out = String::from("## Motive interzise\n");
    for group in &policy.forbidden {
        let _ = writeln!(out, "- [{}] {}", group.snippet, group.reasons.join("; "));
    }
    out.push_str("## Motive permise\n");
    for group in &policy.allowed {
        let _ = writeln!(out, "- [{}] {}", group.snippet, group.reasons.join("; "));
    }
    out
}

/// Render the retrieved snippets, one block per id.
pub fn snippets_section(snippets: &[RetrievalResult]) -> String {
    let mut out = String::from("## POLICY SNIPPETS\n");
    if snippets.is_empty() {
        out.push_str("(niciun fragment relevant)\n");
    }
    for snippet in snippets {
        let _ = writeln!(out, "ID: {}\n{}\n---", snippet.id, snippet.text.trim());
    }
    out
}

/// Full system prompt for one turn.
pub fn build_system_prompt(
    schema: &FormSchema,
    policy: &ReasonPolicy,
    snippets: &[RetrievalResult],
) -> String {
    format!(
        "{}\n{}\n{}\n{}",
        BASE_SYSTEM_PROMPT.trim(),
        fields_section(schema),
        reasons_section(policy),
        snippets_section(snippets)
    )
}
