//! CLI interface for wayfare

use clap::{Parser, Subcommand};
use std::fs;
use wayfare::{logging, Config, FlightQuery, PreferenceInput, Wayfare};

#[derive(Parser)]
#[command(name = "wayfare")]
#[command(about = "Hotel and flight search aggregation")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Search hotels in a location
    Hotels {
        /// City or region; empty searches the default location
        #[arg(default_value = "")]
        location: String,
    },
    /// Show one hotel by provider id
    Hotel {
        id: String,
    },
    /// Search flights
    Flights {
        /// Origin IATA code
        #[arg(short, long)]
        from: String,
        /// Destination IATA code
        #[arg(short, long)]
        to: String,
        /// Departure date (YYYY-MM-DD)
        #[arg(short, long)]
        date: String,
        /// Return date for round trips (YYYY-MM-DD)
        #[arg(short, long)]
        return_date: Option<String>,
        /// Use cached latest prices instead of a live search
        #[arg(long)]
        latest: bool,
        /// Output file for JSON results
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Find cities and airports by name or code
    Airports {
        query: String,
    },
    /// AI hotel recommendations for a location
    Recommend {
        #[arg(short, long)]
        location: String,
        /// Free-text preferences, e.g. "quiet hotel with a pool"
        #[arg(short, long, required_unless_present = "criteria", conflicts_with = "criteria")]
        preferences: Option<String>,
        /// Rank the location's hotels against these criteria instead
        #[arg(short, long)]
        criteria: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    if let Err(e) = logging::init_stderr() {
        eprintln!("Failed to initialize logging: {}", e);
    }

    let wayfare = Wayfare::from_config(&Config::from_env())?;

    match cli.command {
        Commands::Hotels { location } => {
            let hotels = wayfare.search_hotels_by_location(&location).await;
            println!("{}", serde_json::to_string_pretty(&hotels)?);
            eprintln!("Found {} hotels", hotels.len());
        }
        Commands::Hotel { id } => match wayfare.get_hotel_by_id(&id).await {
            Some(hotel) => println!("{}", serde_json::to_string_pretty(&hotel)?),
            None => {
                eprintln!("Hotel {} not found", id);
                std::process::exit(1);
            }
        },
        Commands::Flights {
            from,
            to,
            date,
            return_date,
            latest,
            output,
        } => {
            let query = FlightQuery::new(&from, &to, &date, return_date.as_deref())?;

            eprintln!("Searching for flights...");
            let json = if latest {
                serde_json::to_string_pretty(&wayfare.latest_prices(&query).await?)?
            } else {
                let outcome = wayfare.get_flights(&query).await?;
                if outcome.flights.is_empty() {
                    eprintln!("No flights found");
                    for (label, alternatives) in [
                        ("origin", &outcome.alternative_origin),
                        ("destination", &outcome.alternative_destination),
                    ] {
                        if let Some(alternatives) = alternatives.as_ref().filter(|a| !a.is_empty()) {
                            let codes: Vec<_> = alternatives.iter().map(|a| a.code.as_str()).collect();
                            eprintln!("Nearby {} airports: {}", label, codes.join(", "));
                        }
                    }
                } else {
                    eprintln!("Found {} flights", outcome.flights.len());
                }
                serde_json::to_string_pretty(&outcome)?
            };

            if let Some(output_file) = output {
                fs::write(&output_file, &json)?;
                eprintln!("Results saved to {}", output_file);
            } else {
                println!("{}", json);
            }
        }
        Commands::Airports { query } => {
            let airports = wayfare.search_airports(&query).await?;
            println!("{}", serde_json::to_string_pretty(&airports)?);
        }
        Commands::Recommend {
            location,
            preferences,
            criteria,
        } => {
            let json = match (preferences, criteria) {
                (Some(preferences), _) => {
                    let input = PreferenceInput { location, preferences };
                    serde_json::to_string_pretty(&wayfare.get_personalized_recommendations(&input).await?)?
                }
                (None, criteria) => {
                    let criteria = criteria.unwrap_or_default();
                    let candidates = wayfare.search_hotels_by_location(&location).await;
                    match wayfare.recommend_from_candidates(&candidates, &criteria).await? {
                        Some(recommendations) => serde_json::to_string_pretty(&recommendations)?,
                        None => {
                            eprintln!("Not enough hotels in {} to compare", location);
                            "[]".to_string()
                        }
                    }
                }
            };
            println!("{}", json);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::try_parse_from([
            "wayfare",
            "flights",
            "--from", "DAC",
            "--to", "CXB",
            "--date", "2025-08-15",
        ]);

        assert!(cli.is_ok());

        if let Ok(Cli { command: Commands::Flights { from, to, date, return_date, latest, .. } }) = cli {
            assert_eq!(from, "DAC");
            assert_eq!(to, "CXB");
            assert_eq!(date, "2025-08-15");
            assert!(return_date.is_none());
            assert!(!latest);
        }
    }

    #[test]
    fn test_hotels_location_is_optional() {
        let cli = Cli::try_parse_from(["wayfare", "hotels"]).unwrap();
        match cli.command {
            Commands::Hotels { location } => assert_eq!(location, ""),
            _ => panic!("expected hotels command"),
        }
    }

    #[test]
    fn test_recommend_needs_exactly_one_mode() {
        assert!(Cli::try_parse_from(["wayfare", "recommend", "-l", "Dhaka"]).is_err());
        assert!(Cli::try_parse_from([
            "wayfare", "recommend", "-l", "Dhaka", "-p", "pool", "-c", "cheap"
        ])
        .is_err());
        assert!(Cli::try_parse_from(["wayfare", "recommend", "-l", "Dhaka", "-c", "cheap"]).is_ok());
    }
}
