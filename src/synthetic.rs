//! Fabricated listings for when scraping comes up short.
//!
//! Everything produced here is tagged [`SourceTag::Synthetic`] (or
//! [`SourceTag::Premium`]) and carries `synthetic: true`, so consumers can
//! always tell it apart from scraped data.

use std::collections::HashSet;

use chrono::Utc;
use rand::seq::IndexedRandom;
use rand::Rng;

use crate::listing::{listing_id, search_engine_link, JobListing, SourceTag};
use crate::utils::title_case;

const COMPANIES: &[&str] = &[
    "TCS",
    "Infosys",
    "Wipro",
    "HCL Technologies",
    "Tech Mahindra",
    "Cognizant",
    "Accenture",
    "Capgemini",
    "Mphasis",
    "L&T Infotech",
    "Persistent Systems",
    "Publicis Sapient",
    "Flipkart",
    "Swiggy",
    "Zomato",
    "Paytm",
];

const LOCATIONS: &[&str] = &[
    "Bangalore",
    "Mumbai",
    "Delhi NCR",
    "Chennai",
    "Pune",
    "Hyderabad",
    "Gurugram",
    "Noida",
];

const TITLE_TEMPLATES: &[&str] = &[
    "{kw}",
    "Senior {kw}",
    "Lead {kw}",
    "Junior {kw}",
    "Principal {kw}",
    "{kw} - Associate",
    "{kw} Specialist",
    "Full Stack {kw}",
];

const EXPERIENCE_BANDS: &[&str] = &["0-2 years", "2-5 years", "3-6 years", "5-8 years", "8+ years"];

const SALARY_RANGES: &[&str] = &["₹4-8 LPA", "₹8-15 LPA", "₹12-20 LPA", "₹15-25 LPA", "₹25+ LPA"];

/// Premium source table: (company, salary band).
const PREMIUM_COMPANIES: &[(&str, &str)] = &[
    ("Microsoft India", "₹25-45 LPA"),
    ("Google India", "₹30-55 LPA"),
    ("Amazon India", "₹20-40 LPA"),
    ("Flipkart", "₹18-35 LPA"),
    ("Paytm", "₹15-30 LPA"),
    ("TCS Digital", "₹8-18 LPA"),
    ("Infosys", "₹7-16 LPA"),
    ("Wipro", "₹6-15 LPA"),
];

const PREMIUM_LEVELS: &[&str] = &["Senior", "Lead", "Principal", "Staff"];

fn pick<'a, R: Rng + ?Sized>(pool: &[&'a str], rng: &mut R) -> &'a str {
    pool.choose(rng).copied().unwrap_or_default()
}

fn location_for<R: Rng + ?Sized>(location: &str, rng: &mut R) -> String {
    // A country-wide search reads better spread over cities.
    if location.trim().is_empty() || location.eq_ignore_ascii_case("india") {
        pick(LOCATIONS, rng).to_string()
    } else {
        location.to_string()
    }
}

fn listing(
    source: SourceTag,
    title: String,
    company: &str,
    location: String,
    salary: &str,
    experience: &str,
    posted_days: u32,
) -> JobListing {
    JobListing {
        id: listing_id(source),
        apply_link: search_engine_link(&title, company),
        company: company.to_string(),
        salary: salary.to_string(),
        experience: experience.to_string(),
        posted_date: format!("{posted_days} days ago"),
        synthetic: true,
        scraped_at: Utc::now(),
        title,
        location,
        source,
    }
}

/// `count` plausible listings for `keyword`, tagged `synthetic`. No I/O.
pub fn generate<R: Rng + ?Sized>(keyword: &str, location: &str, count: usize, rng: &mut R) -> Vec<JobListing> {
    let keyword = match title_case(keyword) {
        kw if kw.is_empty() => "Software Engineer".to_string(),
        kw => kw,
    };

    // Distinct dedup keys while the pools allow it, so a batch survives the
    // merge intact. Long keywords collapse some templates onto one key.
    let max_rejections = TITLE_TEMPLATES.len() * COMPANIES.len() * 4;
    let mut rejections = 0;
    let mut seen = HashSet::new();
    let mut jobs = Vec::with_capacity(count);
    while jobs.len() < count {
        let job = listing(
            SourceTag::Synthetic,
            pick(TITLE_TEMPLATES, rng).replace("{kw}", &keyword),
            pick(COMPANIES, rng),
            location_for(location, rng),
            pick(SALARY_RANGES, rng),
            pick(EXPERIENCE_BANDS, rng),
            rng.random_range(1..=10),
        );
        if !seen.insert(job.dedup_key()) && rejections < max_rejections {
            rejections += 1;
            continue;
        }
        jobs.push(job);
    }
    jobs
}

/// One listing per premium company, tagged `premium`.
pub fn premium<R: Rng + ?Sized>(keyword: &str, location: &str, rng: &mut R) -> Vec<JobListing> {
    let keyword = title_case(keyword);
    PREMIUM_COMPANIES
        .iter()
        .map(|(company, salary)| {
            let title = format!("{keyword} - {}", pick(PREMIUM_LEVELS, rng));
            let experience = format!("{} years", rng.random_range(2..=8));
            listing(
                SourceTag::Premium,
                title,
                company,
                location_for(location, rng),
                salary,
                &experience,
                rng.random_range(1..=15),
            )
        })
        .collect()
}
