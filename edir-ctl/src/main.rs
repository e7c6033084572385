use edir_api::{Member, NewMember, Role};

#[derive(structopt::StructOpt)]
struct Opt {
    #[structopt(short, long)]
    host: String,

    #[structopt(subcommand)]
    cmd: Command,
}

#[derive(structopt::StructOpt)]
enum Command {
    /// Register a member
    CreateMember {
        /// Full name
        name: String,

        /// Contact phone number
        contact: String,

        /// Initial password
        initial_password: String,

        /// Role, either "member" or "admin"
        #[structopt(long, default_value = "member")]
        role: Role,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let opt = <Opt as structopt::StructOpt>::from_args();

    let client = reqwest::Client::new();

    match opt.cmd {
        Command::CreateMember {
            name,
            contact,
            initial_password,
            role,
        } => {
            let data = NewMember::new(name, contact, initial_password, role);
            data.validate()?;
            let member = client
                .post(format!("{}/api/members", opt.host))
                .json(&data)
                .send()
                .await?
                .error_for_status()?
                .json::<Member>()
                .await?;
            println!("created member {}", member.id.0);
        }
    }

    Ok(())
}
