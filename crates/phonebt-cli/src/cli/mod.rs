//! Interactive operator shell
//!
//! A line-oriented front end over the engine and the tool dispatcher. Call
//! control goes through the same tool surface the AI agent uses, so the
//! shell prints exactly the JSON an agent would receive.

use std::io::Write;
use std::sync::Arc;

use serde_json::json;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;
use tracing::debug;

use phonebt_hfp_core::{retry_with_backoff, AudioStatus, ConnectionStatus, HfpEngine, RetryConfig};

use crate::error::ClientResult;
use crate::gateway::SimulatedGateway;
use crate::tools::ToolDispatcher;

/// A known paired device
#[derive(Debug, Clone)]
pub struct PairedDevice {
    /// Display name
    pub name: String,
    /// Bluetooth address
    pub address: String,
}

/// The interactive shell
pub struct Shell {
    engine: Arc<HfpEngine>,
    dispatcher: Arc<ToolDispatcher>,
    devices: Vec<PairedDevice>,
    gateway: Option<SimulatedGateway>,
    agent_task: Option<JoinHandle<()>>,
}

impl Shell {
    /// Create a shell over an engine and its dispatcher
    ///
    /// `gateway` enables the simulation-only `ring` command.
    pub fn new(
        engine: Arc<HfpEngine>,
        dispatcher: Arc<ToolDispatcher>,
        devices: Vec<PairedDevice>,
        gateway: Option<SimulatedGateway>,
    ) -> Self {
        Self { engine, dispatcher, devices, gateway, agent_task: None }
    }

    /// Run the read-eval loop until `quit` or end of input
    ///
    /// Returns the process exit code.
    pub async fn run(&mut self) -> ClientResult<i32> {
        println!("PhoneBT {} - type 'help' for commands", phonebt_hfp_core::VERSION);

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            print!("phonebt> ");
            std::io::stdout().flush()?;

            let line = match lines.next_line().await? {
                Some(line) => line,
                None => break,
            };
            if !self.handle(line.trim()).await {
                break;
            }
        }

        if let Some(task) = self.agent_task.take() {
            task.abort();
        }
        Ok(0)
    }

    /// Handle one command line; `false` means quit
    async fn handle(&mut self, line: &str) -> bool {
        let mut parts = line.split_whitespace();
        let command = match parts.next() {
            Some(command) => command,
            None => return true,
        };
        let arg = parts.next();

        match command {
            "scan" | "paired" => self.list_devices(),
            "connect" => self.connect(arg).await,
            "disconnect" => self.engine.disconnect().await,
            "dial" => match arg {
                Some(number) => self.tool("dial_number", json!({ "number": number })).await,
                None => println!("usage: dial <number>"),
            },
            "answer" => self.tool("accept_call", json!({})).await,
            "hangup" => self.tool("end_call", json!({})).await,
            "dtmf" => match arg {
                Some(digit) => self.tool("send_dtmf", json!({ "digit": digit })).await,
                None => println!("usage: dtmf <digit>"),
            },
            "status" => self.tool("get_call_status", json!({})).await,
            "phone" => self.tool("get_phone_status", json!({})).await,
            "audio" => self.toggle_audio().await,
            "agent" => self.toggle_agent(),
            "ring" => match (&self.gateway, arg) {
                (Some(gateway), Some(number)) => gateway.ring(number),
                (Some(_), None) => println!("usage: ring <number>"),
                (None, _) => println!("ring is only available with the simulated gateway"),
            },
            "help" => print_help(self.gateway.is_some()),
            "quit" | "exit" => return false,
            other => println!("unknown command '{}', try 'help'", other),
        }
        true
    }

    fn list_devices(&self) {
        if self.devices.is_empty() {
            println!("no paired devices");
            return;
        }
        for (index, device) in self.devices.iter().enumerate() {
            println!("  [{}] {} ({})", index, device.name, device.address);
        }
    }

    async fn connect(&self, arg: Option<&str>) {
        let index: usize = match arg.unwrap_or("0").parse() {
            Ok(index) => index,
            Err(_) => {
                println!("usage: connect <device index>");
                return;
            }
        };
        let device = match self.devices.get(index) {
            Some(device) => device,
            None => {
                println!("no device at index {}, see 'paired'", index);
                return;
            }
        };
        println!("connecting to {} ...", device.name);
        // transient link failures get a few attempts before giving up
        let engine = self.engine.clone();
        let result = retry_with_backoff("connect", RetryConfig::default(), move || {
            let engine = engine.clone();
            async move { engine.connect().await }
        })
        .await;
        match result {
            Ok(()) => println!("connected"),
            Err(e) => println!("connect failed: {}", e),
        }
    }

    async fn tool(&self, name: &str, args: serde_json::Value) {
        let result = self.dispatcher.execute(name, &args).await;
        println!("{}", result);
    }

    async fn toggle_audio(&self) {
        let state = self.engine.state().await;
        if state.connection != ConnectionStatus::Connected {
            println!("not connected");
            return;
        }
        let result = if state.audio == AudioStatus::Connected {
            self.engine.disconnect_audio().await
        } else {
            self.engine.connect_audio().await
        };
        if let Err(e) = result {
            println!("audio request failed: {}", e);
        }
    }

    /// Toggle printing of agent prompt injections for engine events
    fn toggle_agent(&mut self) {
        if let Some(task) = self.agent_task.take() {
            task.abort();
            println!("agent event feed off");
            return;
        }
        let mut events = self.engine.subscribe();
        self.agent_task = Some(tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                match ToolDispatcher::describe_event(&event) {
                    Some(text) => println!("[event] {}", text),
                    None => debug!(?event, "no prompt rendering"),
                }
            }
        }));
        println!("agent event feed on");
    }
}

fn print_help(simulated: bool) {
    println!("commands:");
    println!("  scan              list devices in range");
    println!("  paired            list paired devices");
    println!("  connect <idx>     connect to a paired device");
    println!("  disconnect        drop the connection");
    println!("  dial <number>     place a call");
    println!("  answer            accept the ringing call");
    println!("  hangup            end or reject the call");
    println!("  dtmf <digit>      send a touch tone");
    println!("  status            show call state");
    println!("  phone             show phone indicators");
    println!("  audio             toggle call audio on this computer");
    println!("  agent             toggle the agent event feed");
    if simulated {
        println!("  ring <number>     simulate an incoming call");
    }
    println!("  quit              exit");
}
