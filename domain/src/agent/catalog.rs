//! Agent catalog.
//!
//! [`AgentCatalog::brf_default`] is the built-in set of sixteen agents for
//! Swedish housing-association (BRF) annual reports. Declaration order is
//! significant: it is the stable batch order within a tier.

use super::entities::{AgentSpec, PriorityTier};
use crate::config::validation::{ConfigIssue, ConfigIssueCode, check_unit_interval};
use crate::core::ids::AgentId;
use crate::extraction::schema::{ExtractionSchema, FieldKind, FieldSpec};
use std::collections::HashSet;

/// Ordered collection of agent specifications.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentCatalog {
    agents: Vec<AgentSpec>,
}

impl AgentCatalog {
    pub fn new(agents: Vec<AgentSpec>) -> Self {
        Self { agents }
    }

    pub fn get(&self, id: &AgentId) -> Option<&AgentSpec> {
        self.agents.iter().find(|a| &a.id == id)
    }

    pub fn contains(&self, id: &AgentId) -> bool {
        self.get(id).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AgentSpec> {
        self.agents.iter()
    }

    pub fn agents(&self) -> &[AgentSpec] {
        &self.agents
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Replace agents with matching ids in place, append the rest.
    pub fn merge(mut self, overrides: impl IntoIterator<Item = AgentSpec>) -> Self {
        for spec in overrides {
            match self.agents.iter_mut().find(|a| a.id == spec.id) {
                Some(existing) => *existing = spec,
                None => self.agents.push(spec),
            }
        }
        self
    }

    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();
        let mut seen = HashSet::new();
        for agent in &self.agents {
            if !seen.insert(&agent.id) {
                issues.push(ConfigIssue::error(
                    ConfigIssueCode::DuplicateAgent,
                    format!("agent '{}' is declared more than once", agent.id),
                ));
            }
            if agent.target_sections.is_empty()
                && agent.aliases.is_empty()
                && agent.keywords.is_empty()
            {
                issues.push(ConfigIssue::warning(
                    ConfigIssueCode::AgentWithoutTargets,
                    format!("agent '{}' declares no target sections and will never run", agent.id),
                ));
            }
            check_unit_interval(
                &mut issues,
                &format!("agents.{}.confidence_threshold", agent.id),
                agent.confidence_threshold,
            );
        }
        issues
    }

    /// The built-in BRF annual report catalog.
    pub fn brf_default() -> Self {
        Self::new(vec![
            // Critical: core financial statements
            governance(),
            income_statement(),
            balance_sheet(),
            cash_flow(),
            // Important: property and detailed notes
            property(),
            multi_year_overview(),
            maintenance_events(),
            note_loans(),
            note_depreciation(),
            note_costs(),
            note_revenue(),
            suppliers_vendors(),
            // Supporting: audit and analysis
            audit_report(),
            ratio_kpi(),
            member_info(),
            pledged_assets(),
        ])
    }
}

fn instruction(subject: &str, look_for: &str, schema: &ExtractionSchema) -> String {
    let fields: Vec<String> = schema
        .fields
        .iter()
        .map(|f| format!("  \"{}\": {}", f.name, f.kind))
        .collect();
    format!(
        "Extract {subject} from this Swedish housing association (BRF) annual report.\n\
         Look for: {look_for}.\n\
         Amounts are in SEK; use the current year's column and write numbers without spaces.\n\n\
         Respond ONLY with a JSON object with these fields (null when not found):\n{{\n{}\n}}",
        fields.join(",\n")
    )
}

fn amount(name: &str) -> FieldSpec {
    FieldSpec::number(name).within(0.0, 1e11)
}

fn signed_amount(name: &str) -> FieldSpec {
    FieldSpec::number(name).within(-1e11, 1e11)
}

fn percent(name: &str) -> FieldSpec {
    FieldSpec::number(name).within(-100.0, 100.0)
}

fn count(name: &str) -> FieldSpec {
    FieldSpec::number(name).within(0.0, 100_000.0)
}

fn record_list(name: &str) -> FieldSpec {
    FieldSpec::list(name)
}

fn build(
    id: &str,
    tier: PriorityTier,
    subject: &str,
    look_for: &str,
    schema: ExtractionSchema,
) -> AgentSpec {
    let text = instruction(subject, look_for, &schema);
    AgentSpec::new(id, tier, text).with_schema(schema)
}

fn governance() -> AgentSpec {
    build(
        "governance_agent",
        PriorityTier::Critical,
        "board and governance information",
        "chairman, board members, deputies, treasurer, secretary, nomination committee, auditor, audit firm",
        ExtractionSchema::new(vec![
            FieldSpec::text("chairman").required(),
            record_list("board_members").required(),
            FieldSpec::text("auditor_name").required(),
            FieldSpec::text("audit_firm"),
            FieldSpec::list("nomination_committee"),
            FieldSpec::text("org_number").required(),
            FieldSpec::text("association_name"),
            FieldSpec::text("property_designation"),
        ]),
    )
    .with_targets(["Förvaltningsberättelse", "Styrelsen", "Valberedning", "Årsstämma"])
    .with_aliases([
        "verksamhetsberättelse",
        "styrelseledamöter",
        "styrelsens sammansättning",
        "styrelsen har utgjorts av",
        "board",
        "board of directors",
        "management report",
    ])
    .with_keywords(["förvaltning", "styrelse", "organisation"])
}

fn income_statement() -> AgentSpec {
    build(
        "income_statement_agent",
        PriorityTier::Critical,
        "the income statement",
        "net revenue, annual fees, rental income, parking, operating costs, maintenance, \
         management costs, personnel costs, depreciation, interest, net income",
        ExtractionSchema::new(vec![
            amount("annual_fees").required(),
            amount("rental_income"),
            amount("parking_income"),
            amount("other_income"),
            amount("total_revenues").required(),
            amount("operating_costs"),
            amount("maintenance_costs"),
            amount("management_costs"),
            amount("personnel_costs"),
            amount("depreciation"),
            amount("interest_expense"),
            amount("interest_income"),
            amount("total_costs"),
            signed_amount("net_income").required(),
            FieldSpec::text("year"),
        ]),
    )
    .with_targets(["Resultaträkning"])
    .with_aliases(["income statement", "profit and loss", "rörelseresultat"])
    .with_keywords(["resultat"])
}

fn balance_sheet() -> AgentSpec {
    build(
        "balance_sheet_agent",
        PriorityTier::Critical,
        "the balance sheet",
        "fixed assets, buildings and land, current assets, cash and bank, equity, member deposits, \
         maintenance fund, retained earnings, long-term and short-term liabilities. \
         Total assets MUST equal total equity plus liabilities",
        ExtractionSchema::new(vec![
            amount("buildings_and_land"),
            amount("equipment"),
            amount("cash_and_bank").required(),
            amount("other_current_assets"),
            amount("total_assets").required(),
            amount("member_deposits"),
            amount("share_capital"),
            amount("maintenance_fund"),
            signed_amount("retained_earnings"),
            signed_amount("year_result"),
            signed_amount("total_equity").required(),
            amount("long_term_debt"),
            amount("short_term_debt"),
            amount("total_liabilities").required(),
            FieldSpec::text("balance_date"),
        ]),
    )
    .with_targets(["Balansräkning"])
    .with_aliases(["tillgångar", "skulder", "eget kapital", "balance sheet"])
    .with_keywords(["balans", "tillgång", "skuld"])
}

fn cash_flow() -> AgentSpec {
    build(
        "cash_flow_agent",
        PriorityTier::Critical,
        "the cash flow statement",
        "operating, investing and financing activities, cash flow for the year, \
         opening and closing cash",
        ExtractionSchema::new(vec![
            signed_amount("operating_activities").required(),
            signed_amount("investing_activities"),
            signed_amount("financing_activities"),
            signed_amount("total_cash_flow"),
            amount("opening_cash"),
            amount("closing_cash").required(),
        ]),
    )
    .with_targets(["Kassaflödesanalys"])
    .with_aliases(["kassaflöde", "cash flow", "cash flow statement"])
    .with_keywords(["kassa", "flöde"])
}

fn property() -> AgentSpec {
    build(
        "property_agent",
        PriorityTier::Important,
        "property information",
        "property designation, address, municipality, construction year, land and living area, \
         number of apartments and commercial units, parking spaces, insurance",
        ExtractionSchema::new(vec![
            FieldSpec::text("property_designation").required(),
            FieldSpec::text("address").required(),
            FieldSpec::text("municipality"),
            FieldSpec::text("construction_year"),
            count("land_area_sqm"),
            count("residential_area_sqm"),
            count("commercial_area_sqm"),
            count("apartments_count").required(),
            count("commercial_units"),
            count("parking_spaces"),
            FieldSpec::text("insurance_company"),
            FieldSpec::text("insurance_type"),
        ]),
    )
    .with_targets(["Föreningens fastighet", "Byggnader och mark", "Fastighetsbeteckning"])
    .with_aliases(["fastigheten", "fastighetsinformation", "property"])
    .with_keywords(["fastighet"])
}

fn multi_year_overview() -> AgentSpec {
    build(
        "multi_year_overview_agent",
        PriorityTier::Important,
        "the multi-year overview table (all available years, index-aligned arrays)",
        "net revenue, operating result, net result, total assets, solidity, \
         debt per sqm, annual fee per sqm",
        ExtractionSchema::new(vec![
            FieldSpec::list("years").required(),
            FieldSpec::list("net_revenue").required(),
            FieldSpec::list("operating_result"),
            FieldSpec::list("net_result"),
            FieldSpec::list("total_assets"),
            FieldSpec::list("solidity_percent").required(),
            FieldSpec::list("debt_per_sqm"),
            FieldSpec::list("annual_fee_per_sqm"),
        ]),
    )
    .with_targets(["Flerårsöversikt", "Femårsöversikt", "Ekonomisk flerårsöversikt"])
    .with_aliases(["multi-year overview", "five year overview"])
    .with_keywords(["flerårs", "femårs"])
}

fn maintenance_events() -> AgentSpec {
    build(
        "maintenance_events_agent",
        PriorityTier::Important,
        "maintenance and significant events",
        "completed projects, planned maintenance, major repairs, pipe, roof, facade, window \
         and elevator renovation, events after the fiscal year",
        ExtractionSchema::new(vec![
            record_list("completed_projects"),
            record_list("planned_maintenance"),
            record_list("significant_events"),
            amount("maintenance_fund_allocation"),
        ]),
    )
    .with_targets(["Väsentliga händelser", "Genomförda projekt", "Planerat underhåll", "Underhållsplan"])
    .with_aliases(["händelser under året", "maintenance plan", "significant events"])
    .with_keywords(["underhåll", "händelse"])
}

fn note_loans() -> AgentSpec {
    build(
        "note_loans_agent",
        PriorityTier::Important,
        "loan details from the notes",
        "lenders, loan numbers, balances, interest rates, fixed or variable rate, maturity, \
         amortization",
        ExtractionSchema::new(vec![
            record_list("loans").required(),
            amount("total_loans").required(),
            amount("long_term_debt"),
            FieldSpec::number("weighted_avg_rate").within(0.0, 25.0),
            amount("within_one_year"),
            amount("after_five_years"),
        ]),
    )
    .with_targets(["Skulder till kreditinstitut", "Långfristiga skulder"])
    .with_aliases(["låneförteckning", "kreditförteckning", "lån", "loans"])
    .with_keywords(["lån", "kredit"])
}

fn note_depreciation() -> AgentSpec {
    build(
        "note_depreciation_agent",
        PriorityTier::Important,
        "depreciation details from the notes",
        "acquisition cost, accumulated depreciation, depreciation for the year, book value, \
         tax assessment values",
        ExtractionSchema::new(vec![
            amount("buildings_acquisition_cost"),
            amount("land_acquisition_cost"),
            amount("accumulated_depreciation"),
            amount("year_depreciation").required(),
            amount("buildings_book_value"),
            amount("land_book_value"),
            amount("buildings_tax_value"),
            amount("land_tax_value"),
            percent("depreciation_rate_percent"),
        ]),
    )
    .with_targets(["Avskrivningar", "Materiella anläggningstillgångar", "Byggnader och mark"])
    .with_aliases(["avskrivningsprinciper", "depreciation"])
    .with_keywords(["avskrivning"])
}

fn note_costs() -> AgentSpec {
    build(
        "note_costs_agent",
        PriorityTier::Important,
        "the operating cost specification from the notes",
        "heating, electricity, water and sewage, waste, cleaning, snow removal, insurance, \
         property tax, management, audit and board fees, repairs",
        ExtractionSchema::new(vec![
            amount("heating"),
            amount("electricity"),
            amount("water_sewage"),
            amount("waste_management"),
            amount("cleaning"),
            amount("snow_removal"),
            amount("property_insurance"),
            amount("property_tax"),
            amount("management_fee"),
            amount("audit_fee"),
            amount("board_compensation"),
            amount("repairs"),
            amount("other_costs"),
            amount("total_operating_costs").required(),
        ]),
    )
    .with_targets(["Driftskostnader", "Specifikation av kostnader"])
    .with_aliases(["kostnadsspecifikation", "rörelsekostnader", "operating costs"])
    .with_keywords(["kostnad"])
}

fn note_revenue() -> AgentSpec {
    build(
        "note_revenue_agent",
        PriorityTier::Important,
        "the revenue specification from the notes",
        "residential and commercial annual fees, rent, parking, storage, transfer and pledge fees, \
         broadband, laundry",
        ExtractionSchema::new(vec![
            amount("annual_fees_residential").required(),
            amount("annual_fees_commercial"),
            amount("commercial_rent"),
            amount("parking_income"),
            amount("storage_income"),
            amount("transfer_fees"),
            amount("mortgage_fees"),
            amount("internet_cable_tv"),
            amount("laundry"),
            amount("other_income"),
            amount("total_revenues"),
            amount("fee_per_sqm"),
        ]),
    )
    .with_targets(["Nettoomsättning", "Rörelseintäkter"])
    .with_aliases(["intäkter", "revenue"])
    .with_keywords(["intäkt"])
}

fn suppliers_vendors() -> AgentSpec {
    build(
        "suppliers_vendors_agent",
        PriorityTier::Important,
        "supplier and vendor information (empty lists when none are mentioned)",
        "banks, insurers, energy and heating suppliers, waste collection, cleaning, property \
         maintenance, elevator service, plumbing, electricians, snow removal, financial and \
         technical management",
        ExtractionSchema::new(vec![
            record_list("banking"),
            record_list("insurance"),
            record_list("utilities"),
            record_list("property_services"),
            record_list("technical_services"),
            record_list("management"),
            record_list("other_suppliers"),
            FieldSpec::text("supplier_list_location"),
        ]),
    )
    .with_targets([
        "Leverantörer",
        "Leverantörsförteckning",
        "Avtalspartners",
        "Samarbetspartners",
        "Tjänsteleverantörer",
    ])
    .with_aliases([
        "entreprenörer",
        "serviceavtal",
        "avtalsparter",
        "leverantörslista",
        "avtalslista",
        "suppliers",
        "vendors",
    ])
    .with_keywords(["leverantör", "avtal", "partner", "tjänst", "entreprenör"])
}

fn audit_report() -> AgentSpec {
    build(
        "audit_report_agent",
        PriorityTier::Supporting,
        "the audit report",
        "opinion, recommendation to adopt the accounts and discharge the board, remarks, \
         auditor name, firm and title, place and date of signature",
        ExtractionSchema::new(vec![
            FieldSpec::text("opinion").required(),
            FieldSpec::new("recommends_approval", FieldKind::Bool),
            FieldSpec::new("recommends_discharge", FieldKind::Bool),
            FieldSpec::text("auditor_name"),
            FieldSpec::text("audit_firm"),
            FieldSpec::text("auditor_title"),
            FieldSpec::text("signature_date"),
            FieldSpec::text("signature_location"),
            FieldSpec::list("remarks"),
        ]),
    )
    .with_targets(["Revisionsberättelse"])
    .with_aliases(["revisorns rapport", "uttalanden", "audit report"])
    .with_keywords(["revision"])
}

fn ratio_kpi() -> AgentSpec {
    build(
        "ratio_kpi_agent",
        PriorityTier::Supporting,
        "key ratios",
        "solidity, liquidity, loan-to-value, debt ratio, operating cost per sqm, \
         interest sensitivity",
        ExtractionSchema::new(vec![
            percent("solidity_percent").required(),
            FieldSpec::number("current_ratio").within(0.0, 1_000.0),
            FieldSpec::number("debt_to_equity").within(0.0, 1_000.0),
            FieldSpec::number("interest_coverage").within(-1_000.0, 1_000.0),
            amount("debt_per_sqm"),
            amount("annual_fee_per_sqm"),
            amount("operating_cost_per_sqm"),
            percent("avg_fee_increase_percent"),
            FieldSpec::text("financial_assessment"),
        ]),
    )
    .with_targets(["Nyckeltal", "Ekonomisk ställning", "Ekonomiska nyckeltal"])
    .with_aliases(["key ratios", "kpi"])
    .with_keywords(["nyckeltal"])
}

fn member_info() -> AgentSpec {
    build(
        "member_info_agent",
        PriorityTier::Supporting,
        "member information",
        "number of members and apartments, transfers, sublets, transfer and pledge fees",
        ExtractionSchema::new(vec![
            count("total_members").required(),
            count("apartments_count"),
            count("transfers_during_year"),
            count("sublets_approved"),
            amount("transfer_fee"),
            amount("mortgage_registration_fee"),
            count("members_at_year_end"),
        ]),
    )
    .with_targets(["Medlemsinformation", "Antal medlemmar", "Överlåtelser", "Andrahandsuthyrning"])
    .with_aliases(["medlemmar", "members"])
    .with_keywords(["medlem"])
}

fn pledged_assets() -> AgentSpec {
    build(
        "pledged_assets_agent",
        PriorityTier::Supporting,
        "pledged assets and contingent liabilities from the notes",
        "property mortgages, pledged mortgage deeds, available deeds, contingent liabilities, \
         guarantees",
        ExtractionSchema::new(vec![
            amount("total_mortgages").required(),
            amount("pledged_to_banks"),
            amount("available_mortgages"),
            FieldSpec::text("contingent_liabilities"),
            FieldSpec::text("guarantees"),
        ]),
    )
    .with_targets(["Ställda säkerheter", "Eventualförpliktelser", "Ansvarsförbindelser"])
    .with_aliases(["panter", "pledged assets"])
    .with_keywords(["säkerhet", "pant"])
}
