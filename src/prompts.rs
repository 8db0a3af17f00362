//! Fixed prompt documents for event extraction.
//!
//! One composition order, always: source preface, an optional dating
//! override, then the attacks-field instruction, then the canonical
//! protocol. Builders must use the composed prompt verbatim; all formatting
//! and footer rules live in the canonical block so the prefaces cannot
//! contradict them.

use crate::sources::DatePolicy;

/// The single authoritative output schema for extraction replies.
pub const CANONICAL_EXTRACTION_PROTOCOL: &str = r#"Canonical Extraction Protocol (v1.1 — Final Hardened Version)

PURPOSE:
Identify and record every democracy-affecting event described in the provided text.
Follow this protocol exactly. Do not improvise, reformat, or combine steps.
Your output must be line-by-line compliant. Any deviation is a failure.

DEFINITION — WHAT COUNTS AS AN “EVENT”:
A single, concrete act that has occurred or been officially announced (past-tense facts only).
Examples include:
• executive orders, agency directives, regulations, or enforcement actions
• court rulings, filings, indictments, or stays
• legislative votes, bills, hearings, investigations, or subpoenas
• elections, campaign filings, appointments, or removals
• statements or leaks revealing new facts of legal, political, or ethical consequence
• protests, censorship, arrests, sanctions, or military deployments
Not events: analysis, speculation, opinions, or reactions.

SCOPE AND EXHAUSTIVENESS:
• Extract every democracy-relevant act; do not merge distinct acts.
• If the input lists many discrete acts, output them all.
• Some sources may instruct “exactly one event” in the preface — honor that.

DATING RULE:
• Use `post_date` (YYYY-MM-DD) unless the text clearly provides a newer, specific action date.
• Skip events older than 14 days unless explicitly newly relevant.

OUTPUT FORMAT — FOLLOW THIS EXACT SCHEMA FOR EACH EVENT:
1) Header (single line, must use an EM DASH “—”):
   {YYYY-MM-DD} — {Concise factual event title}

2) Labeled fields (each on its own line, in this order, no blank lines between):
   Summary: {one short, neutral paragraph (≈60–110 words) — who did what, where, outcome/next step, sufficient
      detail for determining the affect the event has on democracy}
   Source: {one or more DIRECT URLs, space-separated, NO labels, NO punctuation, NO dashes}
   Category: {choose exactly one domain from the list below}
   Why Relevant: {one crisp sentence explaining the democratic significance}
   attacks: [{comma-separated handles or empty}]  ← always present, even if empty

3) Footer (mandatory):
   Total events found: [#]
   [END OF LOG]

STRICT FORMAT RULES:
• Plain text only. No JSON, no code fences, no bullets, no headings, no emojis.
• Use the literal EM DASH (—) in the header (not a hyphen).
• Do not add extra blank lines or extra fields.
• “Summary” = what happened. “Why Relevant” = why it matters. Keep them separate.
• “attacks:” must appear for every event; use `attacks: []` when no category applies.

CATEGORY OPTIONS (pick exactly one per event — policy domain, not process):
1. Executive Actions & Orders
2. Legislative & Oversight Activity
3. Judicial Developments
4. Law Enforcement & Surveillance
5. Elections & Representation
6. Civil Society & Protest
7. Information & Media Control
8. Economic & Regulatory Power
9. Appointments & Patronage
10. Transparency & Records
11. International Relations
12. Civil–Military Relations & State Violence

SELF-CHECK BEFORE OUTPUT:
✅ Header line uses EM DASH and correct date format.
✅ “Source:” contains only direct URL(s), space-separated (no labels like “Ballotpedia — …”).
✅ Category is one of the 12 above.
✅ Every event has an `attacks:` line (either with one or more handles or `[]`).
✅ Footer includes Total events found + [END OF LOG].
✅ If the preface says “exactly one event,” then Total events found: [1].

ZERO-FABRICATION RULE:
Only report actions explicitly described in the text. Do not infer or invent.
If no qualifying events exist, output nothing."#;

/// The mandatory attacks-field instruction, sandwiched between the source
/// preface and the canonical protocol.
pub const ATTACKS_PREFACE: &str = r#"ATTACKS FIELD (MANDATORY — 55 STANDARD CATEGORIES)
For every event, you must decide whether the act described is an “attack” on people, rights, institutions,
truth, the international order, or the Constitution, using the following fixed list of 55 categories.
Output the line:

  attacks: [handle_1, handle_2, …]

for EVERY event. If none apply, output

  attacks: []

Do not skip the line.

WHEN TO TAG AN ATTACK
• Tag an attack when the act narrows rights, access, transparency, protest, immigration/asylum, voting,
  independent oversight, or fair/equal administration of law.
• Tag an attack when the act uses government or political power to punish, coerce, retaliate, or extract
  personal/partisan benefit.
• Tag an attack when the act degrades the capacity of democratic institutions to function (courts, Congress,
  civil service, IGs, intel, diplomacy).
• Tag an attack when the act undermines shared fact, press freedom, or the information environment.
• Tag an attack when the act strikes at constitutional structure (separation of powers, peaceful transfer,
  amendments).
• If the act is remedial, protective, or clearly the reverse (expanding access, restoring transparency,
  protecting dissent), use: attacks: []

HOW MANY TO TAG
• 0 is allowed → attacks: []
• 1–3 is normal
• 4+ only when the text clearly shows multiple victim groups or multiple institutional targets

THE 55 CANONICAL ATTACK HANDLES
(Use these exact spellings; do not invent new ones.)

PART I – The People He Harmed
1. children — attacks on children, students, dependent minors (e.g. SNAP/care cuts that hit kids first)
2. women — attacks on women’s rights, status, or autonomy
3. minorities — attacks on racial, ethnic, or religious minorities
4. immigrants_refugees — attacks on immigrants, migrants, refugees, asylum seekers, family separation, spectacle at the border
5. lgbtq — attacks on LGBTQ+ people and protections
6. workers — attacks on labor, wages, unions, bargaining power
7. poor — attacks on the poor, food/housing insecurity, weaponized benefits
8. veterans — attacks on or neglect of veterans and service access
9. disabled — attacks on people with disabilities or disability supports
10. sick_vulnerable — attacks on the medically vulnerable, serious public-health neglect

PART II – The Nation He Degraded
11. truth — attacks on fact, honesty, reality-based governance
12. science — suppression or distortion of science and evidence
13. education — censorship/defunding/indoctrination in education
14. culture_art — turning culture/art into propaganda or loyalty tests
15. public_memory — rewriting history, erasing conscience, imposed mythology
16. faith — weaponizing religion, redefining morality as obedience
17. decency — normalization of cruelty, corruption, contempt
18. hope — deliberate cultivation of despair or futility

PART III – The Institutions He Broke
19. presidency — monetizing the presidency, destroying norms of restraint
20. courts — defying, packing, or hollowing the courts
21. congress — contempt for, or obstruction of, Congress and oversight
22. civil_service — purging, politicizing, or loyalty-testing the civil service
23. justice_dept — turning DOJ/law enforcement into a personal shield or weapon
24. intelligence — discrediting intel community, empowering conspiracists
25. military — politicizing or misusing the military, oaths to men not laws
26. diplomacy — gutting diplomacy, sidelining State, damaging alliances
27. ig_watchdogs — removing or disabling inspectors general and watchdogs
28. public_service — converting public service into a profit/extraction center

PART IV – The Truth He Erased
29. press — censorship, intimidation, or capture of the press
30. information — gag orders, secrecy, propaganda ecosystems
31. whistleblowers — retaliation/exposure/criminalization of conscience
32. internet — manipulation, deplatforming for loyalty, disinformation infra
33. knowledge — deleting data, reports, archives, inconvenient findings
34. reality — building a parallel universe in which nothing true survives

PART V – The World He Unmade
35. allies — betrayal or coercion of allies (NATO, G7, partners)
36. global_democracy — siding with/autocratizing abroad, abandoning rights
37. trade — weaponizing trade/tariffs/commerce for political reward/punishment
38. peace — withdrawals/war-brinkmanship that destabilize peace
39. climate_cooperation — abandoning climate agreements and joint action
40. idea_of_america — turning the U.S. from beacon to bludgeon

PART VI – The Republic Itself
41. constitution — treating the Constitution as optional/situational
42. separation_of_powers — executive supremacy over checks and balances
43. rule_of_law — loyalty as legality; impunity for in-group, punishment for out-group
44. emoluments — self-enrichment, grift, pay-to-play from public office
45. birthright_citizenship — undermining the 14th Amendment and belonging
46. amendment_22 — testing or eroding two-term limits
47. amendment_25 — shielding incapacity from constitutional remedy
48. peaceful_transfer — attacks on certification, succession, Jan 6-style tactics
49. union — threats/coercion toward states, sabotage of federalism

PART VII – The Future We Must Rebuild
50. environment — degradation of environment, land, protections
51. economy — crony capitalism, extraction of public good
52. public_health — pandemic denial, dismantled health infrastructure
53. civic_education — killing democratic literacy and informed citizenship
54. future — sacrificing long-term national interest for short-term power
55. reality_itself — ultimate authoritarian move: making the lie outlive the truth

FAILURE CONDITIONS
❌ Missing or omitted attacks: [...] on ANY event
❌ Using handles not in the 55-item list above
❌ Using prose (“this was an attack…”) instead of a bracketed list
❌ Narrative/blended output instead of canonical block
❌ Omission of the final footer (`Total events found: …` + `[END OF LOG]`)

NOTES
• This attacks section + the source preface + the Canonical Extraction Protocol are ONE inseparable instruction set.
• Builders must preserve the attacks field exactly as emitted.
• Downstream steps may fan-out or filter by attacks, so omissions here are data loss."#;

/// Fallback preface for Substack-style sources without a custom one.
pub const SUBSTACK_DEFAULT_PREFACE: &str = r#"CONTEXT:
This input represents a Substack post plus fetched article text. Expect narrative
recaps or essays that may mention multiple government actions. Your job is to
extract only the concrete acts (filings, rulings, executive/legislative moves)
per the Canonical protocol. Use `post_date` for dating unless told otherwise."#;

pub const PREFACE_ZETEO: &str = r#"SOURCE: Zeteo — “This Week in Democracy” (Substack).
TYPE: Weekly civic-intelligence digest compiling democracy-related developments across government, law, media, elections, and civil society.
STYLE: Highly structured, high-density lists of short items, usually already grouped by domain (Power, Rights, Information, Elections, etc.).
AUDIENCE: Readers who need a complete weekly rollup of democratic movement — not a narrative, not a selection.

DATA INPUTS:
• JSON input provides `title`, `url`, and `post_date`.
• Full article body is fetched for extraction; ignore layout, embedded media, and section headers — treat all visible text as content.
• Many items will already read like events; your job is to convert them into the canonical format.

TEXT CHARACTERISTICS:
• A normal issue contains 20–40 discrete developments from the prior week.
• Items are short (1–3 sentences) and already factual.
• Items span the full democracy surface: executive actions, congressional moves, court orders, election administration, censorship/press, civil society, economic/regulatory power.
• Each item should normally become exactly one event.

EXPECTED OUTPUT BEHAVIOR:
1. Coverage: extract every democracy-relevant act or development in the issue — one event per described act. If the issue has 30 items, expect ≈30 events.
2. Selection: include only concrete, verifiable acts — new rulings, filings, orders, directives, votes, appointments/removals, censorship, arrests, protest restrictions, releases of key information, sanctions, deployments. Exclude commentary, summaries of prior weeks, or general analysis unless tied to a new act.
3. Granularity: do not merge separate acts even if they are in the same paragraph; “court blocked X” and “governor signed Y” are two events.
4. Completeness: short outputs (<20) are non-compliant unless the issue itself was abnormally short.

DATE RULE:
• Default to the issue’s `post_date`.
• If an item clearly says the act occurred on a later/explicit day (“On Thursday…”, “Earlier today…”, “On 10/29…”), use that date instead.
• Ignore dates that are purely historical/contextual.

SOURCE LINE:
• Attribute as: `Source: Zeteo — This Week in Democracy — {article title}`
• If an item includes a superior primary link (court PDF, agency release, state order), use that link instead of the article URL.

OUTPUT HANDOFF:
• After applying this Zeteo-specific guidance, follow the ATTACKS FIELD instruction and the Canonical Extraction Protocol that follow this preface.
• Do not restate output rules here; the canonical block is the single source of truth for labels, order, footer, and the required `attacks: [...]` line."#;

pub const PREFACE_MEIDAS: &str = r#"SOURCE: MeidasTouch (Substack) — “Today in Politics” bulletins.
TYPE: Daily and weekly political roundups summarizing current U.S. political, legal, and governmental developments.
STYLE: Multi-item news briefs or bullet lists written in short, factual paragraphs with minimal context or commentary.
AUDIENCE: Readers seeking rapid, pro-democracy coverage of the day’s concrete governmental and political actions.

DATA INPUTS:
• JSON provides `title`, `url`, and `post_date`.
• The full article body is fetched for extraction; ignore section headers, images, and embedded media.
• Each bulletin may list 8–20 separate acts, announcements, rulings, or filings.

EXPECTED OUTPUT BEHAVIOR:
1. Coverage: extract every democracy-relevant act — one event per act. If the bulletin reports 15 acts, expect ≈15 events.
2. Selection: include new, verifiable actions, rulings, orders, filings, appointments, sanctions, protests, hearings, or votes.
   Exclude speculation, partisan opinion, or forecasts of future acts.
3. Granularity: if one paragraph reports several actions (“The Senate confirmed X and the President signed Y”), record both separately.
4. Completeness: typical yield is 10–25 event blocks depending on bulletin length and density.
5. Neutrality: past tense, factual tone; no adjectives or evaluative phrasing.
6. Independence: treat each bulletin independently. If an act reappears later, record it again if substantively updated.

DATE RULE:
• Default to the bulletin’s `post_date`.
• If an item specifies a newer explicit date (“On Friday…,” “On 10/29…”), use that date for that event.
• Ignore dates that refer only to background or past context.

SOURCE LINE:
• Attribute as: `Source: MeidasTouch — {article title}`
• If the item provides a more direct link to a court order, filing, or official release, use that instead.

OUTPUT HANDOFF:
• After applying this MeidasTouch-specific guidance, follow the ATTACKS FIELD instruction and the Canonical Extraction Protocol that follow this preface.
• Do not restate output format rules here — the canonical block defines the single authoritative schema for labels, order, and the required `attacks: [...]` line."#;

pub const PREFACE_HCR: &str = r#"SOURCE: Letters from an American (Heather Cox Richardson, Substack).
TYPE: Daily historical essays connecting current political, legal, and institutional developments to democratic principles and historical context.
STYLE: Narrative prose that weaves factual reporting with interpretive framing; factual acts are embedded within analysis rather than isolated as bullet points.
AUDIENCE: Civically engaged readers seeking historical grounding for current events and the functioning of democracy.

DATA INPUTS:
• JSON provides `title`, `url`, and `post_date`.
• Full article text is fetched for extraction; if `type="podcast"`, use the transcript field instead.
• Ignore multimedia, links, or footnotes; extract only from visible narrative text.

EXPECTED OUTPUT BEHAVIOR:
1. Coverage: extract *every* democracy-relevant act — one event per act.
   A typical HCR essay yields 8–20 event blocks.
2. Selection: include all verifiable governmental or institutional actions affecting law, governance, rights, accountability, or democratic norms.
   Exclude interpretation, historical parallels, or rhetorical analysis unless necessary to identify the factual act.
3. Granularity: do not merge distinct acts in a single paragraph. Each signing, ruling, order, vote, or official announcement = one event.
4. Completeness: ensure no qualifying act is omitted, even if it appears within long sentences or dependent clauses.
5. Neutrality: factual, past-tense, reportorial tone only — no evaluative or emotive language.
6. Historical sensitivity: distinguish between *past-context reference* and *newly described current act*; only the latter qualifies as an event.

DATE RULE:
• Default to the article’s `post_date`.
• If the essay clearly cites a newer, specific action date (“On Tuesday the Court…”), use that date.
• Ignore historical references or long-past context used only for illustration.

SOURCE LINE:
• Attribute as: `Source: Letters from an American — {article title}`.
• If the essay cites an authoritative primary source (court filing, transcript, official order), use that URL instead.

OUTPUT HANDOFF:
• After applying this HCR-specific guidance, follow the ATTACKS FIELD INSTRUCTION and the Canonical Extraction Protocol that follow this preface.
• Do not restate format or footer rules here — those are fully defined in the canonical block."#;

pub const PREFACE_DEMOCRACY_DOCKET: &str = r#"SOURCE: Democracy Docket (election-law and voting-rights litigation tracker).
TYPE: Case-based reporting on concrete developments in voting, redistricting, election administration, and related democracy litigation.
STYLE: Procedural, court-centered updates that often bundle several filings or orders from the same dispute.
AUDIENCE: Researchers documenting how litigation is changing access to the ballot, map fairness, and election rules in real time.

DATA INPUTS:
• Input provides `title`, `url`, `post_date`, and the full Democracy Docket post text.
• A single post may report MULTIPLE distinct acts (e.g., new complaint + preliminary injunction + notice of appeal).
• Each concrete act must become its own event. This source is MANY-ACTS-PER-POST.

EXPECTED OUTPUT BEHAVIOR:
1. Coverage: extract EVERY concrete, democracy-relevant act described — one event per act. If the post reports 5 distinct filings/orders, output ≈ 5 events.
2. Selection: INCLUDE court orders, merits opinions, injunctions, stays, denials, remands; new or amended complaints; motions to intervene; notices of appeal; settlements/consent decrees; adoption of new maps; election-rule changes taken in response to the case.
3. Exclude: commentary on why the case matters, restatement of prior background, or media/political reaction with no new legal act.
4. Granularity: do not merge acts even if they occur in the same court on the same day — “panel grants stay” and “plaintiffs file notice of appeal” are two events.
5. Neutrality: report in factual, procedural tone (who acted, in what forum, and what changed for the election/voting/public body).

DATE RULE (OVERRIDE):
• If the post names the date of the act (“On Oct. 29 the panel…”, “Today the court…”, “On Friday the legislature…”), USE THAT DATE.
• Otherwise, default to the post’s `post_date`.
• If the post describes 3 acts on 3 dates, produce 3 events with 3 matching dates.

SOURCE LINE:
• Prefer the most specific litigation link available (court order, docket PDF, filing link).
• If none is present, use the Democracy Docket permalink for that post.
• Source must be ONE OR MORE plain URLs, space-separated, no labels, no markdown.

OUTPUT HANDOFF:
• After applying this Democracy Docket–specific guidance, apply the ATTACKS FIELD INSTRUCTION and then the Canonical Extraction Protocol that follow this preface.
• Final output must therefore be a sequence of discrete event blocks — one per act — ending with:
  Total events found: [#]
  [END OF LOG]"#;

pub const PREFACE_SHADOW: &str = r#"SOURCE: U.S. Supreme Court — Shadow Docket / Emergency Orders (plus parallel emergency rulings from lower federal courts).
TYPE: Single-action judicial decisions that immediately alter what government may do.
STYLE: Procedural but decisive docket-level acts — stays, injunctions, denials, vacaturs, or remands — often brief yet with major institutional impact.
AUDIENCE: Readers tracking how emergency judicial decisions shift power, rights, or election administration.

DATA INPUTS:
• Each record is short and structured (CASE, DECISION_DATE, SOURCE_ROW, brief docket text).
• Each represents exactly ONE operative order — this source is ONE-ACT-PER-RECORD.
• Treat these as official judicial ACTS, not media stories or commentary.

EXPECTED OUTPUT BEHAVIOR:
1. Coverage: emit exactly one event per record.
2. Selection: describe only the operative judicial act (stay, injunction, denial, vacatur, remand, administrative stay, etc.).
3. Granularity: do not merge separate orders or include non-operative commentary.
4. Neutrality: report the posture and consequence; never infer motives or merits.
5. Completeness: summarize who acted, what changed, and the immediate legal or policy consequence.

DATE RULE:
• Prefer the decision or operative order date.
• If unavailable, default to the provided `post_date`.

SOURCE LINE:
• Attribute as: `Source: Supreme Court Shadow Docket — {case name}`
  or use the most specific docket/PDF link available.

OUTPUT HANDOFF:
• After applying this Shadow-Docket-specific guidance, follow the ATTACKS FIELD instructions and the Canonical Extraction Protocol that follow this preface.
• Do not restate output schema or footer rules here — the canonical block defines the authoritative format for labels, order, and inclusion of the `attacks: [...]` line."#;

pub const PREFACE_ORDERS: &str = r#"SOURCE: Federal and state courts issuing emergency, interim, or merits orders.
TYPE: Single-action judicial directives (stays, injunctions, denials, remands) that immediately change what government or litigants may do.
STYLE: Docket-level procedural acts with minimal narrative but significant institutional impact.
AUDIENCE: Researchers documenting how judicial authority redefines or constrains executive, legislative, or electoral power.

DATA INPUTS:
• Each record provides `title`, `url`, and `post_date` (or decision date) and represents one operative judicial order.
• The source text may include the order’s effect, dissenting notes, or procedural posture.
• Each record = ONE event. Do not combine or split.

EXPECTED OUTPUT BEHAVIOR:
1. Coverage: extract exactly one event per record — one court order, one output.
2. Selection: include only the operative judicial act (stay, vacate, grant, deny, remand).
3. Neutrality: factual, procedural, and precise; no interpretation or opinion.
4. Summary: identify who acted, what changed legally or procedurally, and the immediate practical effect.
5. Completeness: ensure the summary covers the nature of relief, affected policy area, and scope of effect.

DATE RULE:
• Use the order or decision date if provided; otherwise, use `post_date`.
• If the text specifies multiple relevant dates (e.g., filing vs. ruling), select the date of the operative order.

SOURCE IDENTIFICATION:
• Attribute as: `Source: Judicial Orders — {case name}` or use the most specific docket or PDF URL available.
• If the post links to multiple filings, prefer the one representing the operative order.

OUTPUT HANDOFF:
• After applying this Orders-specific guidance, apply the ATTACKS FIELD INSTRUCTION and then the Canonical Extraction Protocol that follow this preface.
• Do not restate canonical labels or footer rules here — those are defined in the canonical section."#;

/// Resolve a source key to its preface, tolerating common alias spellings.
/// Unknown keys get the Substack default.
pub fn preface_for(source_key: &str) -> &'static str {
    let key = source_key.trim().to_ascii_lowercase();
    let key = match key.as_str() {
        "democracy_docket" | "democracy-docket" | "dd" => "democracydocket",
        "shadow_docket" | "shadow-docket" => "shadow",
        "letters" | "letters_from_an_american" => "hcr",
        other => other,
    };
    match key {
        "zeteo" => PREFACE_ZETEO,
        "meidas" => PREFACE_MEIDAS,
        "hcr" => PREFACE_HCR,
        "democracydocket" => PREFACE_DEMOCRACY_DOCKET,
        "shadow" => PREFACE_SHADOW,
        "orders" => PREFACE_ORDERS,
        _ => SUBSTACK_DEFAULT_PREFACE,
    }
}

/// Dating-rule override appended for sources whose text names the act's own
/// date (litigation trackers, order feeds) rather than just a publish date.
pub const ACTION_DATE_OVERRIDE: &str = r#"DATING OVERRIDE:
• This source states the date of the underlying act (order, ruling, filing).
• Prefer that explicit action date over `post_date` in every event header."#;

/// Compose the full system prompt for one source.
///
/// Order is deliberate: preface, dating override (when the source's date
/// policy asks for one), attacks instruction, canonical protocol.
pub fn compose_system_prompt(source_key: &str, date_policy: DatePolicy) -> String {
    let mut parts = vec![preface_for(source_key)];
    if date_policy == DatePolicy::PreferActionDate {
        parts.push(ACTION_DATE_OVERRIDE);
    }
    parts.push(ATTACKS_PREFACE);
    parts.push(CANONICAL_EXTRACTION_PROTOCOL);
    parts.join("\n\n")
}
