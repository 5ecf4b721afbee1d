// Contacting a bill's legislators.

use serde::Serialize;

use civic_core::model::{Bill, BillSponsor, Legislator, Level};
use civic_core::repository::{Repository, StoreResult};
use civic_legiscan::response::BillDetail;

use crate::share::encode_component;

/// Everything needed to render one "contact your legislator" entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContactCard {
    pub sponsor: BillSponsor,
    /// Present only when the legislator has an email address.
    pub mailto: Option<String>,
    /// `tel:` link for the listed phone number.
    pub tel: Option<String>,
}

pub fn email_subject(bill: &Bill) -> String {
    format!("Regarding {}", bill.number)
}

pub fn email_body(legislator_name: &str, bill: &Bill) -> String {
    format!(
        "Dear {legislator_name},\n\n\
         I am writing to express my views on {}: {}.\n\n\
         [Your message here]\n\n\
         Thank you for your consideration.\n\n\
         Sincerely,\n[Your name]",
        bill.number, bill.title
    )
}

pub fn mailto_link(legislator: &Legislator, bill: &Bill) -> Option<String> {
    let email = legislator.contact_email.as_deref()?.trim();
    if email.is_empty() {
        return None;
    }
    Some(format!(
        "mailto:{email}?subject={}&body={}",
        encode_component(&email_subject(bill)),
        encode_component(&email_body(&legislator.name, bill))
    ))
}

fn tel_link(legislator: &Legislator) -> Option<String> {
    let phone = legislator.contact_phone.as_deref()?;
    let digits: String = phone
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '+')
        .collect();
    (!digits.is_empty()).then(|| format!("tel:{digits}"))
}

/// Sponsors reported by LegiScan, as legislators ready to import. LegiScan
/// carries no contact details on bill records.
pub fn sponsors_from_detail(detail: &BillDetail) -> Vec<BillSponsor> {
    let title = match detail.bill.level {
        Level::Federal => "Member of Congress",
        Level::State => "State Legislator",
        Level::Municipal => "Council Member",
    };
    detail
        .sponsors
        .iter()
        .map(|s| BillSponsor {
            legislator: Legislator {
                id: s.people_id.to_string(),
                name: match &s.party {
                    Some(party) => format!("{} ({party})", s.name),
                    None => s.name.clone(),
                },
                title: title.to_string(),
                level: detail.bill.level,
                jurisdiction: detail.bill.jurisdiction.clone(),
                contact_email: None,
                contact_phone: None,
                office_address: None,
                website_url: None,
            },
            role: s.role,
        })
        .collect()
}

/// Contact cards for a bill, sponsors before cosponsors.
pub fn contact_cards(repo: &dyn Repository, bill: &Bill) -> StoreResult<Vec<ContactCard>> {
    Ok(repo
        .legislators_for_bill(&bill.id)?
        .into_iter()
        .map(|sponsor| ContactCard {
            mailto: mailto_link(&sponsor.legislator, bill),
            tel: tel_link(&sponsor.legislator),
            sponsor,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use civic_core::db::Database;
    use civic_core::model::SponsorRole;

    fn bill() -> Bill {
        Bill {
            id: "b1".to_string(),
            number: "H.R. 1234".to_string(),
            title: "Healthcare Access Act".to_string(),
            summary: String::new(),
            level: Level::Federal,
            jurisdiction: "United States".to_string(),
            status: "Introduced".to_string(),
            policy_area: "Healthcare".to_string(),
            introduced_date: None,
        }
    }

    fn legislator(id: &str, email: Option<&str>, phone: Option<&str>) -> Legislator {
        Legislator {
            id: id.to_string(),
            name: format!("Rep. {id}"),
            title: "Representative".to_string(),
            level: Level::Federal,
            jurisdiction: "United States".to_string(),
            contact_email: email.map(str::to_string),
            contact_phone: phone.map(str::to_string),
            office_address: None,
            website_url: None,
        }
    }

    #[test]
    fn mailto_has_subject_and_prefilled_body() {
        let link = mailto_link(&legislator("smith", Some("smith@house.gov"), None), &bill()).unwrap();
        assert!(link.starts_with("mailto:smith@house.gov?subject=Regarding%20H.R.%201234&body="));
        assert!(link.contains("Dear%20Rep.%20smith%2C%0A%0A"));
        assert!(link.contains("H.R.%201234%3A%20Healthcare%20Access%20Act."));
    }

    #[test]
    fn no_email_means_no_mailto() {
        assert_eq!(mailto_link(&legislator("x", None, None), &bill()), None);
        assert_eq!(mailto_link(&legislator("x", Some("  "), None), &bill()), None);
    }

    #[test]
    fn tel_link_keeps_digits() {
        assert_eq!(
            tel_link(&legislator("x", None, Some("(202) 555-0100"))).as_deref(),
            Some("tel:2025550100")
        );
        assert_eq!(tel_link(&legislator("x", None, Some("n/a"))), None);
    }

    #[test]
    fn sponsors_from_detail_carry_role_and_party() {
        use civic_core::status::BillStatus;
        use civic_legiscan::response::SponsorRecord;

        let detail = BillDetail {
            bill: bill(),
            status_code: BillStatus::Introduced,
            session_id: None,
            full_text_url: None,
            state_link: None,
            sponsors: vec![
                SponsorRecord {
                    people_id: 7,
                    name: "Jane Smith".into(),
                    role: SponsorRole::Sponsor,
                    party: Some("D".into()),
                },
                SponsorRecord {
                    people_id: 8,
                    name: "John Doe".into(),
                    role: SponsorRole::Cosponsor,
                    party: None,
                },
            ],
        };
        let sponsors = sponsors_from_detail(&detail);
        assert_eq!(sponsors[0].legislator.id, "7");
        assert_eq!(sponsors[0].legislator.name, "Jane Smith (D)");
        assert_eq!(sponsors[0].legislator.title, "Member of Congress");
        assert_eq!(sponsors[1].role, SponsorRole::Cosponsor);
        assert_eq!(sponsors[1].legislator.name, "John Doe");
    }

    #[test]
    fn cards_list_sponsors_before_cosponsors() {
        let db = Database::open(":memory:").unwrap();
        let co = legislator("co", None, None);
        let lead = legislator("lead", Some("lead@house.gov"), None);
        db.upsert_legislator(&co).unwrap();
        db.upsert_legislator(&lead).unwrap();
        db.link_legislator("b1", "co", SponsorRole::Cosponsor).unwrap();
        db.link_legislator("b1", "lead", SponsorRole::Sponsor).unwrap();

        let cards = contact_cards(&db, &bill()).unwrap();
        let ids: Vec<&str> = cards.iter().map(|c| c.sponsor.legislator.id.as_str()).collect();
        assert_eq!(ids, vec!["lead", "co"]);
        assert!(cards[0].mailto.is_some());
        assert!(cards[1].mailto.is_none());
    }
}
